//! Analysis engine access.
//!
//! [`AnalysisEngine`] is the seam between the session and whatever computes
//! moves. [`UciEngine`] speaks UCI to an external process; [`EngineClient`]
//! runs an engine on its own task so the controller never blocks on it.

mod client;
mod protocol;
mod uci;

use std::path::PathBuf;

use async_trait::async_trait;
use chess_core::{Move, Position, SearchBudget};
use serde::{Deserialize, Serialize};

pub use client::{EngineAnswer, EngineClient, EngineReply, RequestKind};
pub use protocol::{parse_line, EngineLine, InfoLine, SearchTracker};
pub use uci::{EngineTimeouts, UciEngine};

use crate::error::EngineError;

/// Correlates an engine reply with the request that caused it.
pub type RequestId = u64;

/// Centipawns reported for a forced mate.
pub const MATE_SCORE: i32 = 10_000;

/// Engine score from the point of view of the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Centipawns(i32),
    /// Mate in this many moves; negative when the side to move is mated.
    Mate(i32),
}

impl Score {
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }
}

/// Outcome of a single search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// `None` when the engine answered `bestmove (none)`.
    pub best_move: Option<Move>,
    pub score: Option<Score>,
    pub depth: Option<u8>,
    pub pv: Vec<Move>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Score,
    pub depth: u8,
    pub pv: Vec<Move>,
}

impl Evaluation {
    /// Score in centipawns from White's point of view.
    pub fn white_centipawns(&self, side_to_move: chess_core::Color) -> i32 {
        match side_to_move {
            chess_core::Color::White => self.score.centipawns(),
            chess_core::Color::Black => -self.score.centipawns(),
        }
    }
}

#[async_trait]
pub trait AnalysisEngine: Send {
    fn name(&self) -> &str;

    /// Forget everything learned about the previous game.
    async fn new_game(&mut self) -> Result<(), EngineError>;

    async fn best_move(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchReport, EngineError>;

    async fn evaluate(&mut self, position: &Position, depth: u8) -> Result<Evaluation, EngineError>;

    async fn shutdown(&mut self);
}

/// Engine binary for the host platform, looked up in the working directory
/// first and on `PATH` otherwise.
pub fn default_engine_path() -> PathBuf {
    let bundled = if cfg!(target_os = "windows") {
        Some("stockfish-windows-x86-64-avx2.exe")
    } else if cfg!(target_os = "macos") {
        Some("stockfish-macos-arm64")
    } else if cfg!(target_os = "linux") {
        Some("stockfish-linux-x86-64-avx2")
    } else {
        None
    };
    bundled
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from("stockfish"))
}
