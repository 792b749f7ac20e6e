//! On-disk save library and per-player results.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PersistError;
use crate::persistence::{self, SaveSummary};
use crate::state::{GameMode, Outcome, SessionState};

const STATS_FILE: &str = "stats.json";

/// A directory of saved games, one `<id>.json` file per session. The
/// player results book lives alongside them in `stats.json`.
#[derive(Debug, Clone)]
pub struct SaveLibrary {
    dir: PathBuf,
}

impl SaveLibrary {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats_path(&self) -> PathBuf {
        self.dir.join(STATS_FILE)
    }

    fn path_of(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write `state` under its session id, replacing an earlier save.
    pub fn save(&self, state: &SessionState) -> Result<Uuid, PersistError> {
        let bytes = persistence::save(state)?;
        let path = self.path_of(state.id);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), "game saved");
        Ok(state.id)
    }

    pub fn load_bytes(&self, id: Uuid) -> Result<Vec<u8>, PersistError> {
        Ok(fs::read(self.path_of(id))?)
    }

    pub fn load(&self, id: Uuid) -> Result<SessionState, PersistError> {
        persistence::load(&self.load_bytes(id)?)
    }

    pub fn remove(&self, id: Uuid) -> Result<(), PersistError> {
        Ok(fs::remove_file(self.path_of(id))?)
    }

    /// Saved games, most recent first. Files not named `<id>.json` are
    /// ignored; unreadable saves are skipped.
    pub fn list(&self) -> Result<Vec<SaveSummary>, PersistError> {
        let mut saves = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !is_save_file(&path) {
                continue;
            }
            match fs::read(&path).map_err(PersistError::from).and_then(|b| persistence::summary(&b)) {
                Ok(summary) => saves.push(summary),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable save"),
            }
        }
        saves.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(saves)
    }
}

fn is_save_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| Uuid::parse_str(stem).is_ok())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl PlayerStats {
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }
}

/// Results of human players against the engine, keyed by player name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBook {
    pub players: BTreeMap<String, PlayerStats>,
}

impl StatsBook {
    /// Load from `path`; a missing file is an empty book.
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| PersistError::Corrupt(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| PersistError::Corrupt(e.to_string()))?;
        Ok(fs::write(path, json)?)
    }

    /// Count a finished game for `player`.
    ///
    /// Only human-vs-engine games count; returns whether the game was recorded.
    pub fn record(&mut self, player: &str, mode: GameMode, outcome: Outcome) -> bool {
        let (Some(human), true) = (mode.human_side(), outcome.is_terminal()) else {
            return false;
        };
        let stats = self.players.entry(player.to_string()).or_default();
        match outcome.winner() {
            Some(winner) if winner == human => stats.wins += 1,
            Some(_) => stats.losses += 1,
            None => stats.ties += 1,
        }
        true
    }

    pub fn get(&self, player: &str) -> PlayerStats {
        self.players.get(player).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DrawReason, GameSetup};
    use chess_core::Color;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("game_session-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_library_save_list_load_remove() {
        let dir = scratch_dir();
        let library = SaveLibrary::open(&dir).unwrap();
        let first = SessionState::new(&GameSetup::default());
        let second = SessionState::new(&GameSetup {
            mode: GameMode::HumanVsHuman,
            ..GameSetup::default()
        });
        library.save(&first).unwrap();
        library.save(&second).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();
        fs::write(dir.join(format!("{}.json", Uuid::new_v4())), "{").unwrap();

        let listed = library.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(library.load(second.id).unwrap(), second);

        library.remove(first.id).unwrap();
        assert_eq!(library.list().unwrap().len(), 1);
        assert!(library.load(first.id).is_err());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_stats_only_count_games_against_engine() {
        let mut book = StatsBook::default();
        let vs_ai = GameMode::HumanVsAi { human: Color::Black };
        assert!(book.record("ann", vs_ai, Outcome::Checkmate { winner: Color::Black }));
        assert!(book.record("ann", vs_ai, Outcome::TimeForfeit { loser: Color::Black }));
        assert!(book.record("ann", vs_ai, Outcome::Draw { reason: DrawReason::Agreement }));
        assert!(!book.record("ann", GameMode::HumanVsHuman, Outcome::Stalemate));
        assert!(!book.record("ann", GameMode::AiVsAi, Outcome::Stalemate));
        assert!(!book.record("ann", vs_ai, Outcome::Ongoing));
        assert_eq!(
            book.get("ann"),
            PlayerStats {
                wins: 1,
                losses: 1,
                ties: 1
            }
        );
        assert_eq!(book.get("bob").games(), 0);
    }

    #[test]
    fn test_stats_book_is_not_listed_as_a_save() {
        let dir = scratch_dir();
        let library = SaveLibrary::open(&dir).unwrap();
        let game = SessionState::new(&GameSetup::default());
        library.save(&game).unwrap();
        let mut book = StatsBook::default();
        book.record("ann", GameMode::HumanVsAi { human: Color::White }, Outcome::Stalemate);
        book.save(&library.stats_path()).unwrap();

        assert_eq!(library.stats_path().parent(), Some(dir.as_path()));
        assert!(!is_save_file(&library.stats_path()));
        let listed = library.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, game.id);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_stats_file_roundtrip() {
        let dir = scratch_dir();
        let path = SaveLibrary::open(&dir).unwrap().stats_path();
        assert_eq!(StatsBook::load(&path).unwrap(), StatsBook::default());

        let mut book = StatsBook::default();
        book.record("ann", GameMode::HumanVsAi { human: Color::White }, Outcome::Stalemate);
        book.save(&path).unwrap();
        assert_eq!(StatsBook::load(&path).unwrap(), book);
        fs::remove_dir_all(dir).unwrap();
    }
}
