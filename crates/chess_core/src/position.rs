//! Immutable board snapshots.
//!
//! A [`Position`] is never edited after construction by the session: the
//! rules oracle produces a fresh value for every applied move, so older
//! snapshots stay valid for undo, persistence and engine round-trips.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::types::*;

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("expected at least 4 FEN fields, found {0}")]
    FieldCount(usize),
    #[error("invalid board section: {0}")]
    Board(String),
    #[error("invalid side to move: {0}")]
    SideToMove(String),
    #[error("invalid castling rights: {0}")]
    Castling(String),
    #[error("invalid en passant square: {0}")]
    EnPassant(String),
    #[error("invalid move counter: {0}")]
    Counter(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub fn all() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    fn to_fen(self) -> String {
        let mut s = String::new();
        if self.white_king_side {
            s.push('K');
        }
        if self.white_queen_side {
            s.push('Q');
        }
        if self.black_king_side {
            s.push('k');
        }
        if self.black_queen_side {
            s.push('q');
        }
        if s.is_empty() {
            s.push('-');
        }
        s
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// `board[rank][file]`, rank 0 is White's back rank.
    pub board: [[Option<Piece>; 8]; 8],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<u8>, // square behind a pawn that just advanced 2
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Position {
    pub fn empty() -> Self {
        Position {
            board: [[None; 8]; 8],
            side_to_move: Color::White,
            castling: CastlingRights::default(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn startpos() -> Self {
        let mut p = Position {
            castling: CastlingRights::all(),
            ..Position::empty()
        };

        let back = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (f, &kind) in back.iter().enumerate() {
            p.board[0][f] = Some(Piece::new(Color::White, kind));
            p.board[1][f] = Some(Piece::new(Color::White, PieceKind::Pawn));
            p.board[6][f] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            p.board[7][f] = Some(Piece::new(Color::Black, kind));
        }
        p
    }

    pub fn piece_at(&self, sq: u8) -> Option<Piece> {
        if sq >= 64 {
            return None;
        }
        self.board[rank_of(sq) as usize][file_of(sq) as usize]
    }

    /// Squares holding a piece, in a1..h8 order.
    pub fn pieces(&self) -> impl Iterator<Item = (u8, Piece)> + '_ {
        (0u8..64).filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    pub fn king_square(&self, color: Color) -> Option<u8> {
        self.pieces()
            .find(|(_, p)| p.color == color && p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    /// Forsyth-Edwards Notation parser used by persistence, tests and UCI setup.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(FenError::FieldCount(parts.len()));
        }

        let board_part = parts[0];
        let stm_part = parts[1];
        let castle_part = parts[2];
        let ep_part = parts[3];
        let halfmove_part = parts.get(4).copied().unwrap_or("0");
        let fullmove_part = parts.get(5).copied().unwrap_or("1");

        let mut pos = Position::empty();
        let ranks: Vec<&str> = board_part.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Board(format!("expected 8 ranks, found {}", ranks.len())));
        }

        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let mut file: i8 = 0;
            let rank: i8 = 7 - rank_idx as i8; // FEN lists rank 8 .. 1
            for ch in rank_str.chars() {
                if let Some(d) = ch.to_digit(10) {
                    file += d as i8;
                } else {
                    let piece = Piece::from_fen_char(ch)
                        .ok_or_else(|| FenError::Board(format!("invalid piece char {ch:?}")))?;
                    if file >= 8 {
                        return Err(FenError::Board(format!("rank {} too long", rank + 1)));
                    }
                    pos.board[rank as usize][file as usize] = Some(piece);
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::Board(format!("rank {} too long", rank + 1)));
                }
            }
            if file != 8 {
                return Err(FenError::Board(format!("rank {} too short", rank + 1)));
            }
        }

        pos.side_to_move = match stm_part {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        if castle_part != "-" {
            for ch in castle_part.chars() {
                match ch {
                    'K' => pos.castling.white_king_side = true,
                    'Q' => pos.castling.white_queen_side = true,
                    'k' => pos.castling.black_king_side = true,
                    'q' => pos.castling.black_queen_side = true,
                    _ => return Err(FenError::Castling(castle_part.to_string())),
                }
            }
        }

        pos.en_passant = if ep_part == "-" {
            None
        } else {
            let sq = coord_to_sq(ep_part).ok_or_else(|| FenError::EnPassant(ep_part.to_string()))?;
            if rank_of(sq) != 2 && rank_of(sq) != 5 {
                return Err(FenError::EnPassant(ep_part.to_string()));
            }
            Some(sq)
        };

        pos.halfmove_clock = halfmove_part
            .parse()
            .map_err(|_| FenError::Counter(halfmove_part.to_string()))?;
        pos.fullmove_number = fullmove_part
            .parse()
            .map_err(|_| FenError::Counter(fullmove_part.to_string()))?;
        if pos.fullmove_number == 0 {
            return Err(FenError::Counter(fullmove_part.to_string()));
        }

        Ok(pos)
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            self.repetition_key(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    /// The first four FEN fields: everything that decides whether two
    /// positions repeat.
    pub fn repetition_key(&self) -> String {
        let mut s = String::with_capacity(64);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board[rank][file] {
                    Some(piece) => {
                        if empty > 0 {
                            s.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        s.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                s.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                s.push('/');
            }
        }
        let stm = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        let ep = self
            .en_passant
            .map(sq_to_coord)
            .unwrap_or_else(|| "-".to_string());
        format!("{s} {stm} {} {ep}", self.castling.to_fen())
    }

    /// Neither side can possibly deliver mate: bare kings, a single minor
    /// piece, or bishops that all stand on one square color.
    pub fn has_insufficient_material(&self) -> bool {
        let mut minors = 0;
        let mut knights = 0;
        let mut bishop_square_colors = [false; 2];
        for (sq, piece) in self.pieces() {
            match piece.kind {
                PieceKind::King => {}
                PieceKind::Knight => {
                    minors += 1;
                    knights += 1;
                }
                PieceKind::Bishop => {
                    minors += 1;
                    bishop_square_colors[((file_of(sq) + rank_of(sq)) % 2) as usize] = true;
                }
                PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
            }
        }
        if minors <= 1 {
            return true;
        }
        knights == 0 && !(bishop_square_colors[0] && bishop_square_colors[1])
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fen())
    }
}

#[cfg(test)]
#[path = "position_tests.rs"]
mod position_tests;
