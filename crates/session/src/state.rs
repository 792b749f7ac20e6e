//! Session data model: who plays which side, how the game ended, and the
//! persisted [`SessionState`].

use std::fmt;

use chess_core::{Color, Position, TimeControl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::ChessClock;
use crate::move_log::MoveLog;

/// Who makes the moves for a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Human,
    Engine,
}

/// Assignment of actors to sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameMode {
    HumanVsHuman,
    HumanVsAi { human: Color },
    AiVsAi,
}

impl GameMode {
    pub fn actor(self, side: Color) -> Actor {
        match self {
            GameMode::HumanVsHuman => Actor::Human,
            GameMode::HumanVsAi { human } if human == side => Actor::Human,
            GameMode::HumanVsAi { .. } | GameMode::AiVsAi => Actor::Engine,
        }
    }

    pub fn uses_engine(self) -> bool {
        !matches!(self, GameMode::HumanVsHuman)
    }

    /// The human's side in a game against the engine.
    pub fn human_side(self) -> Option<Color> {
        match self {
            GameMode::HumanVsAi { human } => Some(human),
            _ => None,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::HumanVsHuman => write!(f, "Human vs Human"),
            GameMode::HumanVsAi { human } => write!(f, "Human ({human}) vs AI"),
            GameMode::AiVsAi => write!(f, "AI vs AI"),
        }
    }
}

/// Engine strength, expressed as search depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Extreme,
}

impl Difficulty {
    pub fn depth(self) -> u8 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 15,
            Difficulty::Extreme => 20,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Extreme => "Extreme",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawReason {
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
    Agreement,
}

/// Game result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Draw { reason: DrawReason },
    Resignation { loser: Color },
    TimeForfeit { loser: Color },
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Ongoing
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            Outcome::Checkmate { winner } => Some(winner),
            Outcome::Resignation { loser } | Outcome::TimeForfeit { loser } => Some(loser.other()),
            _ => None,
        }
    }

    /// PGN-style result: `1-0`, `0-1`, `1/2-1/2` or `*`.
    pub fn result_string(self) -> &'static str {
        match (self, self.winner()) {
            (Outcome::Ongoing, _) => "*",
            (_, Some(Color::White)) => "1-0",
            (_, Some(Color::Black)) => "0-1",
            (_, None) => "1/2-1/2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ongoing => write!(f, "in progress"),
            Outcome::Checkmate { winner } => write!(f, "{winner} wins by checkmate"),
            Outcome::Stalemate => write!(f, "draw by stalemate"),
            Outcome::Draw { reason } => match reason {
                DrawReason::FiftyMoveRule => write!(f, "draw by the fifty-move rule"),
                DrawReason::ThreefoldRepetition => write!(f, "draw by threefold repetition"),
                DrawReason::InsufficientMaterial => write!(f, "draw by insufficient material"),
                DrawReason::Agreement => write!(f, "draw by agreement"),
            },
            Outcome::Resignation { loser } => write!(f, "{loser} resigns"),
            Outcome::TimeForfeit { loser } => write!(f, "{loser} loses on time"),
        }
    }
}

/// Parameters for a fresh game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSetup {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub time_control: TimeControl,
    pub start: Position,
}

impl Default for GameSetup {
    fn default() -> Self {
        Self {
            mode: GameMode::HumanVsAi { human: Color::White },
            difficulty: Difficulty::default(),
            time_control: TimeControl::default(),
            start: Position::startpos(),
        }
    }
}

/// Everything needed to resume a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: Uuid,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub position: Position,
    pub log: MoveLog,
    pub clock: ChessClock,
    #[serde(default)]
    pub outcome: Outcome,
    /// Half-moves played; always equal to `log.len()`.
    pub ply: u32,
    /// Full-move numbers at which a hint was shown.
    #[serde(default)]
    pub hints_used: Vec<u32>,
    /// Side with an open draw offer.
    #[serde(default)]
    pub draw_offer: Option<Color>,
}

impl SessionState {
    pub fn new(setup: &GameSetup) -> Self {
        // Engine-only games always play at full strength
        let difficulty = match setup.mode {
            GameMode::AiVsAi => Difficulty::Extreme,
            _ => setup.difficulty,
        };
        Self {
            id: Uuid::new_v4(),
            mode: setup.mode,
            difficulty,
            position: setup.start.clone(),
            log: MoveLog::new(setup.start.clone()),
            clock: ChessClock::new(setup.time_control),
            outcome: Outcome::Ongoing,
            ply: 0,
            hints_used: Vec::new(),
            draw_offer: None,
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move
    }

    pub fn actor_to_move(&self) -> Actor {
        self.mode.actor(self.side_to_move())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_lookup() {
        let mode = GameMode::HumanVsAi { human: Color::Black };
        assert_eq!(mode.actor(Color::Black), Actor::Human);
        assert_eq!(mode.actor(Color::White), Actor::Engine);
        assert_eq!(GameMode::HumanVsHuman.actor(Color::White), Actor::Human);
        assert_eq!(GameMode::AiVsAi.actor(Color::Black), Actor::Engine);
        assert!(!GameMode::HumanVsHuman.uses_engine());
        assert_eq!(mode.human_side(), Some(Color::Black));
    }

    #[test]
    fn test_result_strings() {
        assert_eq!(Outcome::Ongoing.result_string(), "*");
        assert_eq!(Outcome::Checkmate { winner: Color::Black }.result_string(), "0-1");
        assert_eq!(Outcome::TimeForfeit { loser: Color::Black }.result_string(), "1-0");
        assert_eq!(Outcome::Stalemate.result_string(), "1/2-1/2");
        assert_eq!(
            Outcome::Draw { reason: DrawReason::Agreement }.result_string(),
            "1/2-1/2"
        );
    }

    #[test]
    fn test_ai_vs_ai_forces_extreme() {
        let setup = GameSetup {
            mode: GameMode::AiVsAi,
            difficulty: Difficulty::Easy,
            ..GameSetup::default()
        };
        let state = SessionState::new(&setup);
        assert_eq!(state.difficulty, Difficulty::Extreme);
        assert_eq!(state.ply, 0);
        assert!(state.log.is_empty());
    }

    #[test]
    fn test_mode_serializes_with_tag() {
        let json = serde_json::to_string(&GameMode::HumanVsAi { human: Color::White }).unwrap();
        assert_eq!(json, r#"{"kind":"human_vs_ai","human":"White"}"#);
    }
}
