//! Runs an [`AnalysisEngine`] on a worker task.
//!
//! Requests are fire-and-forget from the caller's side: each one gets a
//! [`RequestId`] and its answer arrives later as an [`EngineReply`] on the
//! reply channel. At most one request is in flight; issuing a new one or
//! calling [`EngineClient::cancel`] abandons the previous request.

use chess_core::{Color, Position, SearchBudget};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AnalysisEngine, Evaluation, RequestId, SearchReport};
use crate::error::EngineError;

/// What a request was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The engine plays this side's move.
    Move(Color),
    Hint,
    Evaluation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAnswer {
    Search(SearchReport),
    Evaluation(Evaluation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub id: RequestId,
    pub kind: RequestKind,
    pub result: Result<EngineAnswer, EngineError>,
}

enum Job {
    Search {
        id: RequestId,
        kind: RequestKind,
        position: Position,
        budget: SearchBudget,
        cancel: oneshot::Receiver<()>,
    },
    Evaluate {
        id: RequestId,
        position: Position,
        depth: u8,
        cancel: oneshot::Receiver<()>,
    },
    NewGame,
    Shutdown(oneshot::Sender<()>),
}

struct InFlight {
    id: RequestId,
    cancel: oneshot::Sender<()>,
}

pub struct EngineClient {
    jobs: Option<mpsc::UnboundedSender<Job>>,
    replies: mpsc::UnboundedSender<EngineReply>,
    worker: Option<JoinHandle<()>>,
    in_flight: Option<InFlight>,
    next_id: RequestId,
}

impl EngineClient {
    /// Move `engine` onto a worker task. Must be called inside a Tokio runtime.
    pub fn start(engine: Box<dyn AnalysisEngine>) -> (Self, mpsc::UnboundedReceiver<EngineReply>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(engine, jobs_rx, replies_tx.clone()));
        let client = Self {
            jobs: Some(jobs_tx),
            replies: replies_tx,
            worker: Some(worker),
            in_flight: None,
            next_id: 1,
        };
        (client, replies_rx)
    }

    /// A client with no engine behind it; every request fails as unavailable.
    pub fn offline() -> (Self, mpsc::UnboundedReceiver<EngineReply>) {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let client = Self {
            jobs: None,
            replies: replies_tx,
            worker: None,
            in_flight: None,
            next_id: 1,
        };
        (client, replies_rx)
    }

    pub fn is_offline(&self) -> bool {
        self.jobs.is_none()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    pub fn best_move(&mut self, kind: RequestKind, position: Position, budget: SearchBudget) -> RequestId {
        let (id, cancel) = self.begin();
        self.submit(
            id,
            kind,
            Job::Search {
                id,
                kind,
                position,
                budget,
                cancel,
            },
        );
        id
    }

    pub fn evaluate(&mut self, position: Position, depth: u8) -> RequestId {
        let (id, cancel) = self.begin();
        self.submit(
            id,
            RequestKind::Evaluation,
            Job::Evaluate {
                id,
                position,
                depth,
                cancel,
            },
        );
        id
    }

    /// Abandon the in-flight request. Its reply, if any, reports `Cancelled`.
    pub fn cancel(&mut self) -> Option<RequestId> {
        let in_flight = self.in_flight.take()?;
        debug!(request = in_flight.id, "cancelling engine request");
        // The worker may already have finished this request
        let _ = in_flight.cancel.send(());
        Some(in_flight.id)
    }

    /// Forget the in-flight marker once its reply has been consumed.
    pub fn finished(&mut self, id: RequestId) {
        if self.in_flight() == Some(id) {
            self.in_flight = None;
        }
    }

    pub fn new_game(&mut self) {
        self.cancel();
        if let Some(jobs) = &self.jobs {
            if jobs.send(Job::NewGame).is_err() {
                warn!("engine worker has stopped");
            }
        }
    }

    /// Stop the worker and close the engine.
    pub async fn shutdown(&mut self) {
        self.cancel();
        let Some(jobs) = self.jobs.take() else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if jobs.send(Job::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "engine worker panicked");
            }
        }
    }

    fn begin(&mut self) -> (RequestId, oneshot::Receiver<()>) {
        self.cancel();
        let id = self.next_id;
        self.next_id += 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.in_flight = Some(InFlight { id, cancel: cancel_tx });
        (id, cancel_rx)
    }

    fn submit(&mut self, id: RequestId, kind: RequestKind, job: Job) {
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !sent {
            let reason = if self.is_offline() {
                "no engine configured"
            } else {
                "engine worker has stopped"
            };
            // The receiver lives as long as the session does
            let _ = self.replies.send(EngineReply {
                id,
                kind,
                result: Err(EngineError::Unavailable(reason.to_string())),
            });
        }
    }
}

impl Drop for EngineClient {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_worker(
    mut engine: Box<dyn AnalysisEngine>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    replies: mpsc::UnboundedSender<EngineReply>,
) {
    info!(engine = engine.name(), "engine worker started");
    while let Some(job) = jobs.recv().await {
        let reply = match job {
            Job::Search {
                id,
                kind,
                position,
                budget,
                mut cancel,
            } => {
                let result = tokio::select! {
                    result = engine.best_move(&position, budget) => result.map(EngineAnswer::Search),
                    _ = &mut cancel => Err(EngineError::Cancelled),
                };
                EngineReply { id, kind, result }
            }
            Job::Evaluate {
                id,
                position,
                depth,
                mut cancel,
            } => {
                let result = tokio::select! {
                    result = engine.evaluate(&position, depth) => result.map(EngineAnswer::Evaluation),
                    _ = &mut cancel => Err(EngineError::Cancelled),
                };
                EngineReply {
                    id,
                    kind: RequestKind::Evaluation,
                    result,
                }
            }
            Job::NewGame => {
                if let Err(e) = engine.new_game().await {
                    warn!(engine = engine.name(), error = %e, "new game not acknowledged");
                }
                continue;
            }
            Job::Shutdown(done) => {
                engine.shutdown().await;
                let _ = done.send(());
                return;
            }
        };
        if let Err(e) = &reply.result {
            debug!(request = reply.id, error = %e, "engine request failed");
        }
        if replies.send(reply).is_err() {
            break;
        }
    }
    engine.shutdown().await;
    info!("engine worker stopped");
}
