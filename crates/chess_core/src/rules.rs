//! The rules oracle.
//!
//! The session never implements chess rules itself. It asks a [`Rules`]
//! implementation for the legal moves of a [`Position`], for the position
//! that results from a move, and for the verdict on a position.
//! [`StandardRules`] answers those questions with `cozy-chess`.

use cozy_chess::{Board, File, Rank, Square};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::{CastlingRights, Position};
use crate::types::*;
use crate::uci::move_to_uci;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("position rejected by the rules oracle: {0}")]
    InvalidPosition(String),
    #[error("illegal move {0}")]
    IllegalMove(String),
}

/// Why a position is drawn without any further moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawKind {
    FiftyMoveRule,
    InsufficientMaterial,
}

/// What the rules say about a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ongoing,
    /// The side to move is mated.
    Checkmate,
    Stalemate,
    Draw(DrawKind),
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        self != Verdict::Ongoing
    }
}

/// Pure legality oracle consumed by the session controller.
pub trait Rules: Send + Sync {
    /// All legal moves, with capture/castle/en-passant flags set.
    fn legal_moves(&self, pos: &Position) -> Result<Vec<Move>, RulesError>;

    /// Produce the position after `mv`. The input is left untouched.
    fn apply_move(&self, pos: &Position, mv: Move) -> Result<Position, RulesError>;

    fn verdict(&self, pos: &Position) -> Result<Verdict, RulesError>;

    fn in_check(&self, pos: &Position) -> Result<bool, RulesError>;
}

/// Standard chess rules backed by `cozy-chess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        Self
    }

    fn board(pos: &Position) -> Result<Board, RulesError> {
        Board::from_fen(&pos.to_fen(), false)
            .map_err(|e| RulesError::InvalidPosition(format!("{e:?}")))
    }

    /// Every legal move as a pair of (cozy move, our move).
    fn moves_of(board: &Board) -> Vec<(cozy_chess::Move, Move)> {
        let mut out = Vec::with_capacity(64);
        board.generate_moves(|moves| {
            for mv in moves {
                out.push((mv, from_cozy_move(board, mv)));
            }
            false
        });
        out
    }
}

impl Rules for StandardRules {
    fn legal_moves(&self, pos: &Position) -> Result<Vec<Move>, RulesError> {
        let board = Self::board(pos)?;
        Ok(Self::moves_of(&board).into_iter().map(|(_, mv)| mv).collect())
    }

    fn apply_move(&self, pos: &Position, mv: Move) -> Result<Position, RulesError> {
        let board = Self::board(pos)?;
        let (cozy_mv, _) = Self::moves_of(&board)
            .into_iter()
            .find(|(_, legal)| legal.same_squares(&mv))
            .ok_or_else(|| RulesError::IllegalMove(move_to_uci(mv)))?;

        let mut next = board.clone();
        next.play_unchecked(cozy_mv);
        Ok(position_from_board(&next))
    }

    fn verdict(&self, pos: &Position) -> Result<Verdict, RulesError> {
        let board = Self::board(pos)?;
        let mut has_moves = false;
        board.generate_moves(|moves| {
            has_moves = moves.into_iter().next().is_some();
            has_moves
        });

        if !has_moves {
            return Ok(if board.checkers().is_empty() {
                Verdict::Stalemate
            } else {
                Verdict::Checkmate
            });
        }
        if pos.halfmove_clock >= 100 {
            return Ok(Verdict::Draw(DrawKind::FiftyMoveRule));
        }
        if pos.has_insufficient_material() {
            return Ok(Verdict::Draw(DrawKind::InsufficientMaterial));
        }
        Ok(Verdict::Ongoing)
    }

    fn in_check(&self, pos: &Position) -> Result<bool, RulesError> {
        Ok(!Self::board(pos)?.checkers().is_empty())
    }
}

fn color_from_cozy(color: cozy_chess::Color) -> Color {
    match color {
        cozy_chess::Color::White => Color::White,
        cozy_chess::Color::Black => Color::Black,
    }
}

fn kind_from_cozy(piece: cozy_chess::Piece) -> PieceKind {
    match piece {
        cozy_chess::Piece::Pawn => PieceKind::Pawn,
        cozy_chess::Piece::Knight => PieceKind::Knight,
        cozy_chess::Piece::Bishop => PieceKind::Bishop,
        cozy_chess::Piece::Rook => PieceKind::Rook,
        cozy_chess::Piece::Queen => PieceKind::Queen,
        cozy_chess::Piece::King => PieceKind::King,
    }
}

/// cozy-chess encodes castling as "king takes own rook"; the session uses
/// the usual king-two-squares form.
fn from_cozy_move(board: &Board, mv: cozy_chess::Move) -> Move {
    let stm = board.side_to_move();
    let moving = board.piece_on(mv.from);
    let target_color = board.color_on(mv.to);
    let from = mv.from as u8;

    if moving == Some(cozy_chess::Piece::King) && target_color == Some(stm) {
        let file = if (mv.to.file() as u8) > (mv.from.file() as u8) {
            File::G
        } else {
            File::C
        };
        let to = Square::new(file, mv.from.rank()) as u8;
        return Move {
            is_castle: true,
            ..Move::new(from, to)
        };
    }

    let is_en_passant = moving == Some(cozy_chess::Piece::Pawn)
        && mv.from.file() != mv.to.file()
        && target_color.is_none();

    Move {
        from,
        to: mv.to as u8,
        promo: mv.promotion.map(kind_from_cozy),
        is_capture: target_color == Some(!stm) || is_en_passant,
        is_en_passant,
        is_castle: false,
    }
}

fn position_from_board(board: &Board) -> Position {
    let mut pos = Position::empty();
    for square in Square::ALL {
        if let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) {
            pos.board[square.rank() as usize][square.file() as usize] =
                Some(Piece::new(color_from_cozy(color), kind_from_cozy(piece)));
        }
    }

    let stm = board.side_to_move();
    pos.side_to_move = color_from_cozy(stm);

    let white = board.castle_rights(cozy_chess::Color::White);
    let black = board.castle_rights(cozy_chess::Color::Black);
    pos.castling = CastlingRights {
        white_king_side: white.short.is_some(),
        white_queen_side: white.long.is_some(),
        black_king_side: black.short.is_some(),
        black_queen_side: black.long.is_some(),
    };

    // cozy-chess keeps the file after every double push; only a capture
    // that is actually legal belongs in the position.
    pos.en_passant = board
        .en_passant()
        .map(|file| {
            let rank = match stm {
                cozy_chess::Color::White => Rank::Sixth,
                cozy_chess::Color::Black => Rank::Third,
            };
            Square::new(file, rank)
        })
        .filter(|&target| has_en_passant_capture(board, target))
        .map(|target| target as u8);
    pos.halfmove_clock = board.halfmove_clock() as u32;
    pos.fullmove_number = board.fullmove_number() as u32;
    pos
}

fn has_en_passant_capture(board: &Board, target: Square) -> bool {
    let mut found = false;
    board.generate_moves(|moves| {
        found = moves.piece == cozy_chess::Piece::Pawn && moves.into_iter().any(|mv| mv.to == target);
        found
    });
    found
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
