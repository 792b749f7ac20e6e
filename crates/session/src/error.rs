//! Error types for the session crate.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chess_core::RulesError;
use thiserror::Error;

use crate::engine::RequestId;

/// Why a proposed move was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// Not in the legal-move set of the current position.
    NotLegal,
    /// The controller is not waiting for a human move from this side.
    NotYourTurn,
    /// The game has already ended.
    GameOver,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::NotLegal => write!(f, "not a legal move in this position"),
            MoveRejection::NotYourTurn => write!(f, "not awaiting a human move"),
            MoveRejection::GameOver => write!(f, "the game is over"),
        }
    }
}

/// Failures reported by an analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine request cancelled")]
    Cancelled,
}

/// Failures while reading or writing saved sessions.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("corrupt save: {0}")]
    Corrupt(String),
    #[error("unsupported save version {found} (this build reads version {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("save storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("illegal move {mv}: {reason}")]
    IllegalMove { mv: String, reason: MoveRejection },
    #[error("move {0} reaches the last rank and needs a promotion piece")]
    AmbiguousPromotion(String),
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("undo is only possible in human-vs-human games or while paused")]
    UndoNotPermitted,
    #[error("no moves to undo")]
    NothingToUndo,
    #[error("there is no draw offer from the opponent")]
    NoDrawOffer,
    #[error("not possible while {0}")]
    InvalidPhase(String),
    #[error("request {0} was superseded before it finished")]
    RequestCancelled(RequestId),
    #[error("session closed")]
    Closed,
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl SessionError {
    pub(crate) fn rejected(mv: impl ToString, reason: MoveRejection) -> Self {
        SessionError::IllegalMove {
            mv: mv.to_string(),
            reason,
        }
    }
}
