//! Scripted engine for exercising sessions without an engine binary.
//!
//! ```
//! use game_session::testing::{Scripted, ScriptedEngine};
//!
//! let engine = ScriptedEngine::new([Scripted::reply("e7e5"), Scripted::Hang]);
//! assert_eq!(engine.remaining(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chess_core::{parse_uci_move, Move, Position, SearchBudget};

use crate::engine::{AnalysisEngine, Evaluation, Score, SearchReport};
use crate::error::EngineError;

/// One scripted answer, consumed by the next request.
#[derive(Debug, Clone)]
pub enum Scripted {
    Line {
        best: Option<String>,
        score: Option<Score>,
        pv: Vec<String>,
    },
    Fail(EngineError),
    /// Never answers; only cancellation ends the request.
    Hang,
}

impl Scripted {
    pub fn reply(best: &str) -> Self {
        Scripted::Line {
            best: Some(best.to_string()),
            score: None,
            pv: vec![best.to_string()],
        }
    }

    pub fn scored(best: &str, centipawns: i32) -> Self {
        Scripted::Line {
            best: Some(best.to_string()),
            score: Some(Score::Centipawns(centipawns)),
            pv: vec![best.to_string()],
        }
    }

    pub fn no_move() -> Self {
        Scripted::Line {
            best: None,
            score: None,
            pv: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedEngine {
    script: VecDeque<Scripted>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: Arc::default(),
        }
    }

    /// Requests received so far, as `go ...` / `eval ...` lines with the FEN.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    async fn next(&mut self) -> Result<SearchReport, EngineError> {
        let step = self
            .script
            .pop_front()
            .ok_or_else(|| EngineError::Unavailable("script exhausted".into()))?;
        match step {
            Scripted::Line { best, score, pv } => Ok(SearchReport {
                best_move: best.as_deref().map(to_move).transpose()?,
                score,
                depth: Some(1),
                pv: pv.iter().map(|txt| to_move(txt)).collect::<Result<_, _>>()?,
            }),
            Scripted::Fail(e) => Err(e),
            Scripted::Hang => std::future::pending().await,
        }
    }
}

fn to_move(txt: &str) -> Result<Move, EngineError> {
    parse_uci_move(txt).map_err(|e| EngineError::Protocol(e.to_string()))
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.record("ucinewgame".to_string());
        Ok(())
    }

    async fn best_move(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchReport, EngineError> {
        self.record(format!("{} {}", budget.go_command(), position.to_fen()));
        self.next().await
    }

    async fn evaluate(&mut self, position: &Position, depth: u8) -> Result<Evaluation, EngineError> {
        self.record(format!("eval {depth} {}", position.to_fen()));
        let report = self.next().await?;
        let score = report
            .score
            .ok_or_else(|| EngineError::Protocol("search finished without a score".into()))?;
        Ok(Evaluation {
            score,
            depth,
            pv: report.pv,
        })
    }

    async fn shutdown(&mut self) {
        self.script.clear();
    }
}
