//! TOML configuration.
//!
//! ```toml
//! [engine]
//! path = "/usr/local/bin/stockfish"
//! move_timeout_ms = 30000
//! [engine.options]
//! Threads = "2"
//!
//! [game]
//! mode = "human_vs_ai"
//! human_side = "White"
//! difficulty = "hard"
//! fallback = "random_move"
//! time_control = { minutes = 5, increment_secs = 3 }
//!
//! [storage]
//! directory = "saves"
//! player = "alice"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_core::{Color, Position, SearchBudget, TimeControl};
use serde::{Deserialize, Serialize};

use crate::engine::{default_engine_path, EngineTimeouts};
use crate::error::ConfigError;
use crate::state::{Difficulty, GameMode, GameSetup};

/// What the controller does when the engine fails to produce a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// The engine's side loses by resignation.
    Resign,
    /// A uniformly random legal move is played for the engine.
    #[default]
    RandomMove,
    /// Stop the clock and wait for an explicit retry.
    PauseAndRetry,
}

/// Behaviour knobs of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub fallback: FallbackPolicy,
    pub hint_budget: SearchBudget,
    pub pause_clock_during_hint: bool,
    pub analysis_depth: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            hint_budget: SearchBudget::time(Duration::from_millis(100)),
            pause_clock_during_hint: false,
            analysis_depth: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub game: GameConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            fallback: self.game.fallback,
            hint_budget: SearchBudget::time(Duration::from_millis(self.engine.hint_move_time_ms)),
            pause_clock_during_hint: self.game.pause_clock_during_hint,
            analysis_depth: self.engine.analysis_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine binary; the platform default when unset
    pub path: Option<PathBuf>,
    pub handshake_timeout_ms: u64,
    /// Longest wait for a depth-limited move
    pub move_timeout_ms: u64,
    pub stop_grace_ms: u64,
    pub hint_move_time_ms: u64,
    pub analysis_depth: u8,
    /// Passed to the engine as `setoption name <key> value <value>`
    pub options: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            handshake_timeout_ms: 5_000,
            move_timeout_ms: 30_000,
            stop_grace_ms: 1_000,
            hint_move_time_ms: 100,
            analysis_depth: 15,
            options: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_engine_path)
    }

    pub fn timeouts(&self) -> EngineTimeouts {
        EngineTimeouts {
            handshake: Duration::from_millis(self.handshake_timeout_ms),
            search: Duration::from_millis(self.move_timeout_ms),
            grace: Duration::from_millis(self.stop_grace_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeChoice {
    HumanVsHuman,
    #[default]
    HumanVsAi,
    AiVsAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControlConfig {
    pub minutes: u64,
    #[serde(default)]
    pub increment_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub mode: ModeChoice,
    pub human_side: Color,
    pub difficulty: Difficulty,
    /// Unlimited time when absent
    pub time_control: Option<TimeControlConfig>,
    pub fallback: FallbackPolicy,
    pub pause_clock_during_hint: bool,
    pub tick_interval_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            mode: ModeChoice::default(),
            human_side: Color::White,
            difficulty: Difficulty::default(),
            time_control: None,
            fallback: FallbackPolicy::default(),
            pause_clock_during_hint: false,
            tick_interval_ms: 100,
        }
    }
}

impl GameConfig {
    pub fn mode(&self) -> GameMode {
        match self.mode {
            ModeChoice::HumanVsHuman => GameMode::HumanVsHuman,
            ModeChoice::HumanVsAi => GameMode::HumanVsAi {
                human: self.human_side,
            },
            ModeChoice::AiVsAi => GameMode::AiVsAi,
        }
    }

    pub fn setup(&self) -> GameSetup {
        GameSetup {
            mode: self.mode(),
            difficulty: self.difficulty,
            time_control: self
                .time_control
                .map(|tc| TimeControl::new(tc.minutes, tc.increment_secs))
                .unwrap_or_else(TimeControl::unlimited),
            start: Position::startpos(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Name under which results are recorded
    pub player: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("saves"),
            player: "guest".to_string(),
        }
    }
}
