//! UCI long-algebraic move notation and `position` command handling.

use thiserror::Error;

use crate::position::{FenError, Position};
use crate::rules::{Rules, RulesError};
use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("malformed move text {0:?}")]
    BadMove(String),
    #[error("malformed position command: {0}")]
    BadPosition(String),
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error(transparent)]
    Rules(#[from] RulesError),
}

pub fn move_to_uci(mv: Move) -> String {
    let mut s = String::new();
    s.push_str(&sq_to_coord(mv.from));
    s.push_str(&sq_to_coord(mv.to));
    if let Some(p) = mv.promo {
        s.push(p.to_char());
    }
    s
}

/// Parse `e2e4` / `e7e8q` into a flagless move. Legality is not checked.
pub fn parse_uci_move(txt: &str) -> Result<Move, NotationError> {
    let txt = txt.trim();
    let bad = || NotationError::BadMove(txt.to_string());
    if !(txt.len() == 4 || txt.len() == 5) || !txt.is_ascii() {
        return Err(bad());
    }
    let from = coord_to_sq(&txt[0..2]).ok_or_else(bad)?;
    let to = coord_to_sq(&txt[2..4]).ok_or_else(bad)?;
    let promo = match txt.as_bytes().get(4) {
        None => None,
        Some(&ch) => match PieceKind::from_char(ch as char) {
            Some(kind @ (PieceKind::Queen | PieceKind::Rook | PieceKind::Bishop | PieceKind::Knight)) => {
                Some(kind)
            }
            _ => return Err(bad()),
        },
    };
    Ok(Move {
        promo,
        ..Move::new(from, to)
    })
}

/// Parse a move and match it against the legal moves so flags
/// (capture/castle/en passant) are correct.
pub fn resolve_uci_move(rules: &dyn Rules, pos: &Position, txt: &str) -> Result<Move, NotationError> {
    let wanted = parse_uci_move(txt)?;
    rules
        .legal_moves(pos)?
        .into_iter()
        .find(|m| m.same_squares(&wanted))
        .ok_or_else(|| RulesError::IllegalMove(txt.to_string()).into())
}

/// The `position` command that sets `pos` on an engine.
pub fn position_command(pos: &Position) -> String {
    format!("position fen {}", pos.to_fen())
}

/// Parse the arguments of a `position` command:
/// `startpos [moves ...]` or `fen <6 fields> [moves ...]`.
pub fn parse_position_command(rules: &dyn Rules, args: &[&str]) -> Result<Position, NotationError> {
    let moves_at = args.iter().position(|&a| a == "moves").unwrap_or(args.len());
    let (setup, moves) = args.split_at(moves_at);

    let mut pos = match setup.first().copied() {
        Some("startpos") => Position::startpos(),
        Some("fen") => Position::from_fen(&setup[1..].join(" "))?,
        _ => return Err(NotationError::BadPosition(args.join(" "))),
    };

    for txt in moves.iter().skip(1) {
        let mv = resolve_uci_move(rules, &pos, txt)?;
        pos = rules.apply_move(&pos, mv)?;
    }
    Ok(pos)
}

#[cfg(test)]
#[path = "uci_tests.rs"]
mod uci_tests;
