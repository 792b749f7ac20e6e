//! Async front door of a session.
//!
//! [`spawn_session`] moves a [`GameController`] onto an actor task that owns
//! it exclusively. Front-ends talk to it through a cloneable
//! [`SessionHandle`] and follow the game on a broadcast channel of
//! [`SessionEvent`]s. The actor feeds the controller three kinds of input:
//! commands, engine replies and clock ticks. Each one is preceded by the
//! time elapsed since the previous cycle, measured with a monotonic clock.

use std::time::Duration;

use chess_core::{Color, Move};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{GameController, Input, Phase};
use crate::engine::{EngineReply, Evaluation, RequestId};
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::state::{GameSetup, SessionState};

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Point-in-time copy of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub phase: Phase,
    pub pending_request: Option<RequestId>,
    pub evaluation: Option<Evaluation>,
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub enum SessionCommand {
    MakeMove { mv: Move, reply: Reply<()> },
    Hint { reply: Reply<Move> },
    Evaluate { depth: Option<u8>, reply: Reply<RequestId> },
    Undo { reply: Reply<()> },
    Resign { side: Color, reply: Reply<()> },
    OfferDraw { side: Color, reply: Reply<()> },
    AcceptDraw { side: Color, reply: Reply<()> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    RetryEngine { reply: Reply<()> },
    NewGame { setup: GameSetup, reply: Reply<()> },
    Save { reply: Reply<Vec<u8>> },
    Load { bytes: Vec<u8>, reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn make_move(&self, mv: Move) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::MakeMove { mv, reply }).await
    }

    /// Suggested move for the human to move.
    pub async fn hint(&self) -> Result<Move, SessionError> {
        self.call(|reply| SessionCommand::Hint { reply }).await
    }

    pub async fn evaluate(&self, depth: Option<u8>) -> Result<RequestId, SessionError> {
        self.call(|reply| SessionCommand::Evaluate { depth, reply }).await
    }

    pub async fn undo(&self) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Undo { reply }).await
    }

    pub async fn resign(&self, side: Color) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Resign { side, reply }).await
    }

    pub async fn offer_draw(&self, side: Color) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::OfferDraw { side, reply }).await
    }

    pub async fn accept_draw(&self, side: Color) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::AcceptDraw { side, reply }).await
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Resume { reply }).await
    }

    pub async fn retry_engine(&self) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::RetryEngine { reply }).await
    }

    pub async fn new_game(&self, setup: GameSetup) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::NewGame { setup, reply }).await
    }

    pub async fn save(&self) -> Result<Vec<u8>, SessionError> {
        self.call(|reply| SessionCommand::Save { reply }).await
    }

    pub async fn load(&self, bytes: Vec<u8>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Load { bytes, reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session and its engine. Later calls fail with `Closed`.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Start the actor. `replies` is the receiver paired with the controller's
/// engine client. The returned receiver is subscribed before the actor
/// starts, so it sees the startup events.
pub fn spawn_session(
    controller: GameController,
    replies: mpsc::UnboundedReceiver<EngineReply>,
    tick_interval: Duration,
) -> (SessionHandle, broadcast::Receiver<SessionEvent>, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);
    let actor = SessionActor {
        controller,
        events: events_tx.clone(),
        hint_waiters: Vec::new(),
        last_cycle: Instant::now(),
    };
    let task = tokio::spawn(actor.run(commands_rx, replies, tick_interval));
    let handle = SessionHandle {
        commands: commands_tx,
        events: events_tx,
    };
    (handle, events_rx, task)
}

struct SessionActor {
    controller: GameController,
    events: broadcast::Sender<SessionEvent>,
    hint_waiters: Vec<(RequestId, Reply<Move>)>,
    last_cycle: Instant,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut replies: mpsc::UnboundedReceiver<EngineReply>,
        tick_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.publish();

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(reply) = replies.recv() => {
                    let elapsed = self.lap();
                    if let Err(e) = self.controller.advance(elapsed, Some(Input::Engine(reply))) {
                        warn!(error = %e, "engine reply could not be applied");
                    }
                }
                _ = ticker.tick() => {
                    let elapsed = self.lap();
                    self.controller.tick(elapsed);
                }
            }
            self.publish();
        }
        self.shutdown().await;
    }

    fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last_cycle;
        self.last_cycle = now;
        elapsed
    }

    fn handle(&mut self, command: SessionCommand) {
        let elapsed = self.lap();
        let command = match command {
            SessionCommand::MakeMove { mv, reply } => {
                let result = self.controller.advance(elapsed, Some(Input::HumanMove(mv)));
                let _ = reply.send(result);
                return;
            }
            other => other,
        };

        // Every other command sees the clock brought up to date first
        self.controller.tick(elapsed);
        let c = &mut self.controller;
        match command {
            SessionCommand::MakeMove { .. } | SessionCommand::Shutdown { .. } => {}
            SessionCommand::Hint { reply } => match c.request_hint() {
                Ok(id) => self.hint_waiters.push((id, reply)),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            SessionCommand::Evaluate { depth, reply } => {
                let _ = reply.send(c.request_evaluation(depth));
            }
            SessionCommand::Undo { reply } => {
                let _ = reply.send(c.undo_last());
            }
            SessionCommand::Resign { side, reply } => {
                let _ = reply.send(c.resign(side));
            }
            SessionCommand::OfferDraw { side, reply } => {
                let _ = reply.send(c.offer_draw(side));
            }
            SessionCommand::AcceptDraw { side, reply } => {
                let _ = reply.send(c.accept_draw(side));
            }
            SessionCommand::Pause { reply } => {
                let _ = reply.send(c.pause());
            }
            SessionCommand::Resume { reply } => {
                let _ = reply.send(c.resume());
            }
            SessionCommand::RetryEngine { reply } => {
                let _ = reply.send(c.retry_engine());
            }
            SessionCommand::NewGame { setup, reply } => {
                let _ = reply.send(c.new_game(&setup));
            }
            SessionCommand::Save { reply } => {
                let _ = reply.send(c.save());
            }
            SessionCommand::Load { bytes, reply } => {
                let _ = reply.send(c.load(&bytes));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    state: c.state().clone(),
                    phase: c.phase(),
                    pending_request: c.pending_request(),
                    evaluation: c.evaluation().cloned(),
                });
            }
        }
    }

    /// Broadcast new events and settle hint requests they answer.
    fn publish(&mut self) {
        for event in self.controller.take_events() {
            match &event {
                SessionEvent::HintReady { request, mv } => self.answer_hint(*request, || Ok(*mv)),
                SessionEvent::EngineUnavailable {
                    request,
                    side: None,
                    reason,
                } => self.answer_hint(*request, || Err(SessionError::EngineUnavailable(reason.clone()))),
                _ => {}
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }

        // Hints abandoned by a move, pause or new game
        let pending = self.controller.pending_request();
        let (live, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hint_waiters)
            .into_iter()
            .partition(|(id, _)| Some(*id) == pending);
        self.hint_waiters = live;
        for (id, reply) in dropped {
            let _ = reply.send(Err(SessionError::RequestCancelled(id)));
        }
    }

    fn answer_hint(&mut self, request: RequestId, result: impl Fn() -> Result<Move, SessionError>) {
        let (answered, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hint_waiters)
            .into_iter()
            .partition(|(id, _)| *id == request);
        self.hint_waiters = waiting;
        for (_, reply) in answered {
            let _ = reply.send(result());
        }
    }

    async fn shutdown(self) {
        info!("session shutting down");
        for (id, reply) in self.hint_waiters {
            let _ = reply.send(Err(SessionError::RequestCancelled(id)));
        }
        self.controller.shutdown().await;
        debug!("session closed");
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;
