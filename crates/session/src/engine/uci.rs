//! UCI engine driven over a child process or any pair of async streams.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chess_core::{position_command, Position, SearchBudget};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use super::protocol::{parse_line, EngineLine, SearchTracker};
use super::{AnalysisEngine, Evaluation, SearchReport};
use crate::error::EngineError;

type Reader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// How long to wait on the engine at each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// `uci` .. `uciok` and `isready` .. `readyok`
    pub handshake: Duration,
    /// Ceiling for searches bounded only by depth or nodes
    pub search: Duration,
    /// Extra time granted past a `movetime`, and for `stop` to be honoured
    pub grace: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(5),
            search: Duration::from_secs(30),
            grace: Duration::from_secs(1),
        }
    }
}

pub struct UciEngine {
    name: String,
    reader: Reader,
    writer: Writer,
    child: Option<Child>,
    timeouts: EngineTimeouts,
    /// A `go` was sent and its `bestmove` has not been read yet.
    searching: bool,
    dead: Option<String>,
}

impl UciEngine {
    /// Start the engine binary at `path` and complete the UCI handshake.
    pub async fn spawn(
        path: &Path,
        options: &BTreeMap<String, String>,
        timeouts: EngineTimeouts,
    ) -> Result<Self, EngineError> {
        info!(path = %path.display(), "starting engine");
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", path.display())))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            return Err(EngineError::Unavailable("engine pipes not captured".into()));
        };

        let mut engine = Self::from_streams(stdout, stdin, timeouts);
        engine.child = Some(child);
        engine.handshake(options).await?;
        Ok(engine)
    }

    /// Talk UCI over already-connected streams.
    pub async fn connect<R, W>(
        reader: R,
        writer: W,
        options: &BTreeMap<String, String>,
        timeouts: EngineTimeouts,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut engine = Self::from_streams(reader, writer, timeouts);
        engine.handshake(options).await?;
        Ok(engine)
    }

    fn from_streams<R, W>(reader: R, writer: W, timeouts: EngineTimeouts) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            name: "engine".to_string(),
            reader: BufReader::new(reader).lines(),
            writer: Box::new(writer),
            child: None,
            timeouts,
            searching: false,
            dead: None,
        }
    }

    async fn handshake(&mut self, options: &BTreeMap<String, String>) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.timeouts.handshake;
        self.send("uci").await?;
        loop {
            match parse_line(&self.read_line(deadline, self.timeouts.handshake).await?)? {
                EngineLine::UciOk => break,
                EngineLine::Id { key, value } if key == "name" => self.name = value,
                _ => {}
            }
        }
        for (name, value) in options {
            self.send(&format!("setoption name {name} value {value}")).await?;
        }
        self.sync(deadline).await?;
        info!(engine = %self.name, "engine ready");
        Ok(())
    }

    async fn sync(&mut self, deadline: Instant) -> Result<(), EngineError> {
        self.send("isready").await?;
        loop {
            let line = self.read_line(deadline, self.timeouts.handshake).await?;
            if let EngineLine::ReadyOk = parse_line(&line)? {
                return Ok(());
            }
        }
    }

    async fn send(&mut self, line: &str) -> Result<(), EngineError> {
        self.check_alive()?;
        trace!(engine = %self.name, "> {line}");
        let written = async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await
        }
        .await;
        written.map_err(|e| self.fail(format!("write failed: {e}")))
    }

    /// Next line before `deadline`; `limit` is what a timeout reports.
    async fn read_line(&mut self, deadline: Instant, limit: Duration) -> Result<String, EngineError> {
        self.check_alive()?;
        let read = timeout_at(deadline, self.reader.next_line()).await;
        match read {
            Ok(Ok(Some(line))) => {
                trace!(engine = %self.name, "< {line}");
                Ok(line)
            }
            Ok(Ok(None)) => Err(self.fail("engine closed its output".to_string())),
            Ok(Err(e)) => Err(self.fail(format!("read failed: {e}"))),
            Err(_) => Err(EngineError::Timeout(limit)),
        }
    }

    fn check_alive(&self) -> Result<(), EngineError> {
        match &self.dead {
            Some(reason) => Err(EngineError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, reason: String) -> EngineError {
        warn!(engine = %self.name, %reason, "engine connection lost");
        self.dead = Some(reason.clone());
        EngineError::Unavailable(reason)
    }

    /// Stop a search left running by an abandoned request and swallow its
    /// late `bestmove`, so the next reply belongs to the next request.
    async fn settle(&mut self) -> Result<(), EngineError> {
        if !self.searching {
            return Ok(());
        }
        debug!(engine = %self.name, "stopping abandoned search");
        self.send("stop").await?;
        let deadline = Instant::now() + self.timeouts.grace;
        loop {
            match self.read_line(deadline, self.timeouts.grace).await {
                Ok(line) => {
                    if let Ok(EngineLine::BestMove { .. }) = parse_line(&line) {
                        self.searching = false;
                        return Ok(());
                    }
                }
                Err(EngineError::Timeout(_)) => {
                    return Err(self.fail("engine ignored stop".to_string()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn search(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchReport, EngineError> {
        self.settle().await?;
        let limit = match budget.move_time {
            Some(t) => t + self.timeouts.grace,
            None => self.timeouts.search,
        };

        self.send(&position_command(position)).await?;
        // Set before writing: a request dropped mid-write may still have
        // put `go` on the pipe.
        self.searching = true;
        self.send(&budget.go_command()).await?;

        let deadline = Instant::now() + limit;
        let mut tracker = SearchTracker::default();
        loop {
            let line = match self.read_line(deadline, limit).await {
                Ok(line) => line,
                Err(EngineError::Timeout(_)) => {
                    warn!(engine = %self.name, ?limit, "search timed out");
                    // Leave the stream clean for the next request
                    self.settle().await?;
                    return Err(EngineError::Timeout(limit));
                }
                Err(e) => return Err(e),
            };
            match parse_line(&line)? {
                EngineLine::Info(info) => tracker.observe(&info),
                EngineLine::BestMove { best, .. } => {
                    self.searching = false;
                    return Ok(tracker.finish(best));
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl AnalysisEngine for UciEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.settle().await?;
        self.send("ucinewgame").await?;
        let deadline = Instant::now() + self.timeouts.handshake;
        self.sync(deadline).await
    }

    async fn best_move(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchReport, EngineError> {
        self.search(position, budget).await
    }

    async fn evaluate(&mut self, position: &Position, depth: u8) -> Result<Evaluation, EngineError> {
        let report = self.search(position, SearchBudget::depth(depth)).await?;
        let score = report
            .score
            .ok_or_else(|| EngineError::Protocol("search finished without a score".into()))?;
        Ok(Evaluation {
            score,
            depth: report.depth.unwrap_or(depth),
            pv: report.pv,
        })
    }

    async fn shutdown(&mut self) {
        if self.dead.is_none() {
            let _ = self.settle().await;
            if let Err(e) = self.send("quit").await {
                debug!(engine = %self.name, error = %e, "quit not delivered");
            }
        }
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(self.timeouts.grace, child.wait()).await {
                Ok(Ok(status)) => debug!(engine = %self.name, %status, "engine exited"),
                _ => {
                    warn!(engine = %self.name, "engine did not exit, killing it");
                    if let Err(e) = child.kill().await {
                        warn!(engine = %self.name, error = %e, "kill failed");
                    }
                }
            }
        }
        self.dead = Some("engine shut down".to_string());
    }
}

#[cfg(test)]
#[path = "uci_tests.rs"]
mod uci_tests;
