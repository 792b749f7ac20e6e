//! Parsing of the lines a UCI engine writes.

use chess_core::{parse_uci_move, Move};

use super::{Score, SearchReport};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    Id { key: String, value: String },
    UciOk,
    ReadyOk,
    Info(InfoLine),
    BestMove { best: Option<Move>, ponder: Option<Move> },
    /// Anything the session has no use for (`option`, `copyprotection`, ...).
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: Option<u8>,
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<Move>,
}

fn malformed(line: &str) -> EngineError {
    EngineError::Protocol(format!("malformed engine output {line:?}"))
}

fn number<T: std::str::FromStr>(line: &str, token: Option<&str>) -> Result<T, EngineError> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| malformed(line))
}

pub fn parse_line(line: &str) -> Result<EngineLine, EngineError> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    let parsed = match tokens.next() {
        Some("uciok") => EngineLine::UciOk,
        Some("readyok") => EngineLine::ReadyOk,
        Some("id") => {
            let key = tokens.next().ok_or_else(|| malformed(line))?.to_string();
            let value = tokens.collect::<Vec<_>>().join(" ");
            EngineLine::Id { key, value }
        }
        Some("bestmove") => {
            let best = match tokens.next() {
                None => return Err(malformed(line)),
                Some("(none)" | "0000") => None,
                Some(txt) => Some(parse_uci_move(txt).map_err(|_| malformed(line))?),
            };
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(txt)) => parse_uci_move(txt).ok(),
                _ => None,
            };
            EngineLine::BestMove { best, ponder }
        }
        Some("info") => EngineLine::Info(parse_info(line, tokens)?),
        _ => EngineLine::Other(line.to_string()),
    };
    Ok(parsed)
}

fn parse_info<'a>(line: &str, mut tokens: impl Iterator<Item = &'a str>) -> Result<InfoLine, EngineError> {
    let mut info = InfoLine::default();
    while let Some(token) = tokens.next() {
        match token {
            "depth" => info.depth = Some(number(line, tokens.next())?),
            "multipv" => info.multipv = Some(number(line, tokens.next())?),
            "score" => {
                let kind = tokens.next();
                let value: i32 = number(line, tokens.next())?;
                info.score = Some(match kind {
                    Some("cp") => Score::Centipawns(value),
                    Some("mate") => Score::Mate(value),
                    _ => return Err(malformed(line)),
                });
            }
            "pv" => {
                for txt in tokens.by_ref() {
                    info.pv.push(parse_uci_move(txt).map_err(|_| malformed(line))?);
                }
            }
            // Free text runs to the end of the line
            "string" => break,
            _ => {}
        }
    }
    Ok(info)
}

/// Keeps the freshest principal-variation data while a search runs.
#[derive(Debug, Default)]
pub struct SearchTracker {
    depth: Option<u8>,
    score: Option<Score>,
    pv: Vec<Move>,
}

impl SearchTracker {
    pub fn observe(&mut self, info: &InfoLine) {
        // Only the main line counts when the engine reports several
        if info.multipv.is_some_and(|n| n != 1) {
            return;
        }
        if info.depth.is_some() {
            self.depth = info.depth;
        }
        if info.score.is_some() {
            self.score = info.score;
        }
        if !info.pv.is_empty() {
            self.pv = info.pv.clone();
        }
    }

    pub fn finish(self, best_move: Option<Move>) -> SearchReport {
        SearchReport {
            best_move,
            score: self.score,
            depth: self.depth,
            pv: self.pv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handshake_lines() {
        assert_eq!(parse_line("uciok").unwrap(), EngineLine::UciOk);
        assert_eq!(parse_line("readyok\r").unwrap(), EngineLine::ReadyOk);
        assert_eq!(
            parse_line("id name Stockfish 16").unwrap(),
            EngineLine::Id {
                key: "name".into(),
                value: "Stockfish 16".into()
            }
        );
        assert!(matches!(
            parse_line("option name Hash type spin default 16").unwrap(),
            EngineLine::Other(_)
        ));
    }

    #[test]
    fn test_parse_bestmove() {
        let line = parse_line("bestmove e2e4 ponder e7e5").unwrap();
        let EngineLine::BestMove { best, ponder } = line else {
            panic!("expected bestmove");
        };
        assert_eq!(best.unwrap().to_string(), "e2e4");
        assert_eq!(ponder.unwrap().to_string(), "e7e5");

        assert_eq!(
            parse_line("bestmove (none)").unwrap(),
            EngineLine::BestMove { best: None, ponder: None }
        );
        assert!(matches!(parse_line("bestmove"), Err(EngineError::Protocol(_))));
        assert!(matches!(parse_line("bestmove z9z9"), Err(EngineError::Protocol(_))));
    }

    #[test]
    fn test_parse_info_line() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp -35 lowerbound nodes 40213 pv g8f6 c2c4 e7e6";
        let EngineLine::Info(info) = parse_line(line).unwrap() else {
            panic!("expected info");
        };
        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Centipawns(-35)));
        assert_eq!(info.pv.len(), 3);
        assert_eq!(info.pv[0].to_string(), "g8f6");
    }

    #[test]
    fn test_info_string_is_free_text() {
        let EngineLine::Info(info) = parse_line("info string depth score pv nonsense").unwrap() else {
            panic!("expected info");
        };
        assert_eq!(info, InfoLine::default());
    }

    #[test]
    fn test_malformed_score_rejected() {
        assert!(parse_line("info depth 3 score cp abc").is_err());
        assert!(parse_line("info depth x").is_err());
    }

    #[test]
    fn test_tracker_keeps_main_line() {
        let mut tracker = SearchTracker::default();
        let main = InfoLine {
            depth: Some(8),
            multipv: Some(1),
            score: Some(Score::Mate(2)),
            pv: vec![parse_uci_move("d1h5").unwrap()],
        };
        let second = InfoLine {
            depth: Some(8),
            multipv: Some(2),
            score: Some(Score::Centipawns(10)),
            pv: vec![parse_uci_move("a2a3").unwrap()],
        };
        tracker.observe(&main);
        tracker.observe(&second);
        let report = tracker.finish(None);
        assert_eq!(report.score, Some(Score::Mate(2)));
        assert_eq!(report.depth, Some(8));
        assert_eq!(report.pv[0].to_string(), "d1h5");
    }
}
