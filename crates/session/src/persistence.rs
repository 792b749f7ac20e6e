//! Versioned JSON save format.
//!
//! A save is a JSON object with a `version` field next to the session. The
//! version is read on its own first, so a save written by a newer build is
//! reported as unsupported instead of as corrupt.

use chess_core::{Color, PieceKind, Rules};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PersistError;
use crate::state::{GameMode, Outcome, SessionState};

pub const SAVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SaveFile {
    version: u32,
    saved_at: DateTime<Utc>,
    session: SessionState,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<u32>,
}

/// Summary of a save, readable without restoring the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub id: Uuid,
    pub mode: GameMode,
    pub ply: u32,
    pub outcome: Outcome,
    pub saved_at: DateTime<Utc>,
}

pub fn save(state: &SessionState) -> Result<Vec<u8>, PersistError> {
    let file = SaveFile {
        version: SAVE_VERSION,
        saved_at: Utc::now(),
        session: state.clone(),
    };
    serde_json::to_vec_pretty(&file).map_err(|e| PersistError::Corrupt(e.to_string()))
}

/// Decode a save and check that it is internally consistent.
pub fn load(bytes: &[u8]) -> Result<SessionState, PersistError> {
    let file = decode(bytes)?;
    check(&file.session)?;
    Ok(file.session)
}

/// Like [`load`], and additionally replay the move log through `rules`.
pub fn load_verified(bytes: &[u8], rules: &dyn Rules) -> Result<SessionState, PersistError> {
    let state = load(bytes)?;
    state.log.verify(rules).map_err(PersistError::Corrupt)?;
    Ok(state)
}

pub fn summary(bytes: &[u8]) -> Result<SaveSummary, PersistError> {
    let file = decode(bytes)?;
    Ok(SaveSummary {
        id: file.session.id,
        mode: file.session.mode,
        ply: file.session.ply,
        outcome: file.session.outcome,
        saved_at: file.saved_at,
    })
}

fn decode(bytes: &[u8]) -> Result<SaveFile, PersistError> {
    let probe: VersionProbe =
        serde_json::from_slice(bytes).map_err(|e| PersistError::Corrupt(e.to_string()))?;
    match probe.version {
        None => return Err(PersistError::Corrupt("missing format version".into())),
        Some(SAVE_VERSION) => {}
        Some(found) => {
            return Err(PersistError::UnsupportedVersion {
                found,
                supported: SAVE_VERSION,
            })
        }
    }
    serde_json::from_slice(bytes).map_err(|e| PersistError::Corrupt(e.to_string()))
}

fn check(state: &SessionState) -> Result<(), PersistError> {
    let corrupt = |msg: &str| Err(PersistError::Corrupt(msg.to_string()));
    if state.ply as usize != state.log.len() {
        return corrupt("ply count does not match the move log");
    }
    if &state.position != state.log.current_position() {
        return corrupt("position does not match the move log");
    }
    for color in Color::BOTH {
        let kings = state
            .position
            .pieces()
            .filter(|(_, p)| p.color == color && p.kind == PieceKind::King)
            .count();
        if kings != 1 {
            return corrupt("each side needs exactly one king");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GameSetup;
    use chess_core::{resolve_uci_move, StandardRules};

    fn played_state() -> SessionState {
        let rules = StandardRules::new();
        let mut state = SessionState::new(&GameSetup::default());
        for txt in ["e2e4", "c7c5", "g1f3"] {
            let pos = state.position.clone();
            let mv = resolve_uci_move(&rules, &pos, txt).unwrap();
            let after = rules.apply_move(&pos, mv).unwrap();
            state.log.push(crate::move_log::LogEntry {
                mv,
                side: pos.side_to_move,
                san: crate::move_log::san(&rules, &pos, mv).unwrap(),
                position: after.clone(),
                clock_before: state.clock.clone(),
                played_at: Utc::now(),
            });
            state.position = after;
            state.ply += 1;
        }
        state.hints_used.push(2);
        state
    }

    #[test]
    fn test_save_load_roundtrip() {
        let state = played_state();
        let bytes = save(&state).unwrap();
        assert_eq!(load(&bytes).unwrap(), state);
        assert_eq!(load_verified(&bytes, &StandardRules::new()).unwrap(), state);
    }

    #[test]
    fn test_future_version_unsupported() {
        let bytes = br#"{"version": 7, "session": {"anything": true}}"#;
        assert!(matches!(
            load(bytes),
            Err(PersistError::UnsupportedVersion { found: 7, supported: 1 })
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(load(b"not json"), Err(PersistError::Corrupt(_))));
        assert!(matches!(load(b"{}"), Err(PersistError::Corrupt(_))));
        assert!(matches!(
            load(br#"{"version": 1, "session": 3}"#),
            Err(PersistError::Corrupt(_))
        ));
    }

    #[test]
    fn test_inconsistent_ply_is_corrupt() {
        let mut state = played_state();
        state.ply = 1;
        let bytes = save(&state).unwrap();
        assert!(matches!(load(&bytes), Err(PersistError::Corrupt(_))));
    }

    #[test]
    fn test_summary() {
        let state = played_state();
        let summary = summary(&save(&state).unwrap()).unwrap();
        assert_eq!(summary.id, state.id);
        assert_eq!(summary.ply, 3);
        assert_eq!(summary.outcome, Outcome::Ongoing);
    }
}
