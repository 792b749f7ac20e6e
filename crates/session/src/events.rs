use chess_core::{Color, Move, Position};
use uuid::Uuid;

use crate::config::FallbackPolicy;
use crate::engine::{Evaluation, RequestId};
use crate::state::{Actor, GameMode, Outcome};

/// Notifications published by a session, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionStarted {
        id: Uuid,
        mode: GameMode,
    },
    MoveApplied {
        ply: u32,
        side: Color,
        by: Actor,
        mv: Move,
        san: String,
        position: Position,
    },
    EngineThinking {
        side: Color,
        request: RequestId,
    },
    HintReady {
        request: RequestId,
        mv: Move,
    },
    EvaluationReady {
        request: RequestId,
        evaluation: Evaluation,
        /// Centipawns from White's point of view
        white_centipawns: i32,
    },
    DrawOffered(Color),
    MoveUndone {
        ply: u32,
        position: Position,
    },
    ClockExpired(Color),
    /// An engine request failed. `side` is set when the engine was due to move.
    EngineUnavailable {
        request: RequestId,
        side: Option<Color>,
        reason: String,
    },
    FallbackApplied {
        side: Color,
        policy: FallbackPolicy,
    },
    Paused,
    Resumed,
    GameEnded(Outcome),
}
