//! Ordered record of the moves of a game.
//!
//! Every entry stores the position the move produced and the clock as it
//! stood before the move, so the last move can be taken back exactly and a
//! saved game can be checked by replaying it.

use chess_core::{Color, Move, PieceKind, Position, Rules, RulesError, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::ChessClock;

/// A recorded move with SAN notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub mv: Move,
    pub side: Color,
    /// Standard Algebraic Notation representation
    pub san: String,
    /// Position after the move
    pub position: Position,
    pub clock_before: ChessClock,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLog {
    initial: Position,
    entries: Vec<LogEntry>,
}

impl MoveLog {
    pub fn new(initial: Position) -> Self {
        Self {
            initial,
            entries: Vec::new(),
        }
    }

    pub fn initial(&self) -> &Position {
        &self.initial
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<LogEntry> {
        self.entries.pop()
    }

    /// Position after the last logged move.
    pub fn current_position(&self) -> &Position {
        self.entries
            .last()
            .map(|e| &e.position)
            .unwrap_or(&self.initial)
    }

    /// Position the move at `index` was played from.
    pub fn position_before(&self, index: usize) -> &Position {
        match index {
            0 => &self.initial,
            i => &self.entries[i - 1].position,
        }
    }

    /// Every position of the game, starting with the initial one.
    pub fn positions(&self) -> impl Iterator<Item = &Position> + '_ {
        std::iter::once(&self.initial).chain(self.entries.iter().map(|e| &e.position))
    }

    /// How often `pos` has occurred, ignoring the move counters.
    pub fn repetition_count(&self, pos: &Position) -> usize {
        let key = pos.repetition_key();
        self.positions()
            .filter(|p| p.repetition_key() == key)
            .count()
    }

    pub fn uci_moves(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.mv.to_string()).collect()
    }

    /// Replay the log with `rules` and confirm every stored position.
    pub fn verify(&self, rules: &dyn Rules) -> Result<(), String> {
        let mut pos = self.initial.clone();
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.side != pos.side_to_move {
                return Err(format!("move {} played by the wrong side", i + 1));
            }
            let legal = rules.legal_moves(&pos).map_err(|e| e.to_string())?;
            let mv = legal
                .into_iter()
                .find(|m| m.same_squares(&entry.mv))
                .ok_or_else(|| format!("move {} ({}) is illegal", i + 1, entry.mv))?;
            pos = rules.apply_move(&pos, mv).map_err(|e| e.to_string())?;
            if pos != entry.position {
                return Err(format!("position after move {} does not match", i + 1));
            }
        }
        Ok(())
    }
}

/// Standard Algebraic Notation for `mv` played from `pos`.
pub fn san(rules: &dyn Rules, pos: &Position, mv: Move) -> Result<String, RulesError> {
    let piece = pos
        .piece_at(mv.from)
        .ok_or_else(|| RulesError::IllegalMove(mv.to_string()))?;

    let mut san = String::new();
    if mv.is_castle {
        san.push_str(if mv.to > mv.from { "O-O" } else { "O-O-O" });
    } else {
        if piece.kind != PieceKind::Pawn {
            san.push(piece.kind.to_char().to_ascii_uppercase());
            san.push_str(&disambiguation(rules, pos, mv, piece.kind)?);
        }

        let is_capture = mv.is_capture || mv.is_en_passant || pos.piece_at(mv.to).is_some();
        if is_capture {
            if piece.kind == PieceKind::Pawn {
                san.push((b'a' + (mv.from % 8)) as char);
            }
            san.push('x');
        }

        san.push_str(&chess_core::sq_to_coord(mv.to));

        if let Some(promo) = mv.promo {
            san.push('=');
            san.push(promo.to_char().to_ascii_uppercase());
        }
    }

    let after = rules.apply_move(pos, mv)?;
    if rules.verdict(&after)? == Verdict::Checkmate {
        san.push('#');
    } else if rules.in_check(&after)? {
        san.push('+');
    }
    Ok(san)
}

/// File, rank or both when another piece of the same kind reaches `mv.to`.
fn disambiguation(
    rules: &dyn Rules,
    pos: &Position,
    mv: Move,
    kind: PieceKind,
) -> Result<String, RulesError> {
    let rivals: Vec<u8> = rules
        .legal_moves(pos)?
        .into_iter()
        .filter(|m| m.to == mv.to && m.from != mv.from)
        .filter(|m| pos.piece_at(m.from).map(|p| p.kind) == Some(kind))
        .map(|m| m.from)
        .collect();
    if rivals.is_empty() {
        return Ok(String::new());
    }
    let coord = chess_core::sq_to_coord(mv.from);
    let (file, rank) = coord.split_at(1);
    let shares_file = rivals.iter().any(|&sq| sq % 8 == mv.from % 8);
    let shares_rank = rivals.iter().any(|&sq| sq / 8 == mv.from / 8);
    Ok(match (shares_file, shares_rank) {
        (false, _) => file.to_string(),
        (true, false) => rank.to_string(),
        (true, true) => coord,
    })
}
