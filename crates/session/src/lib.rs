//! Chess game sessions.
//!
//! A session arbitrates turns between human players and an analysis engine,
//! runs the game clock, keeps the move log and saves games. The rules of
//! chess come from [`chess_core`]; this crate decides who moves, when, and
//! what happens when time runs out or the engine misbehaves.

pub mod clock;
pub mod config;
pub mod controller;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod move_log;
pub mod persistence;
pub mod review;
pub mod state;
pub mod testing;

pub use clock::ChessClock;
pub use config::{AppConfig, FallbackPolicy, SessionOptions};
pub use controller::{GameController, Input, Phase};
pub use driver::{spawn_session, SessionHandle, SessionSnapshot};
pub use engine::{AnalysisEngine, EngineClient, EngineReply, Evaluation, RequestId, Score, UciEngine};
pub use error::{ConfigError, EngineError, MoveRejection, PersistError, SessionError};
pub use events::SessionEvent;
pub use library::{PlayerStats, SaveLibrary, StatsBook};
pub use move_log::{LogEntry, MoveLog};
pub use state::{Actor, Difficulty, DrawReason, GameMode, GameSetup, Outcome, SessionState};
