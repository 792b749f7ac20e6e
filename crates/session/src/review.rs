//! Post-game review: grade each move against the engine and step through
//! the finished game.

use chess_core::{Color, Move, Position, Rules, Verdict};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{AnalysisEngine, Evaluation, Score};
use crate::error::EngineError;
use crate::move_log::MoveLog;

/// Largest loss, in centipawns, still graded [`MoveGrade::Good`].
pub const GOOD_MOVE_MARGIN: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveGrade {
    /// The engine's first choice.
    Best,
    Good,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAssessment {
    pub ply: u32,
    pub side: Color,
    pub mv: Move,
    pub san: String,
    pub grade: MoveGrade,
    pub best: Option<Move>,
    /// Centipawns lost by the mover compared with the position before
    pub loss: Option<i32>,
}

/// Grade every move in `log`, evaluating each position once at `depth`.
pub async fn review_game(
    engine: &mut dyn AnalysisEngine,
    rules: &dyn Rules,
    log: &MoveLog,
    depth: u8,
) -> Result<Vec<MoveAssessment>, EngineError> {
    let mut evals = Vec::with_capacity(log.len() + 1);
    for pos in log.positions() {
        evals.push(evaluate(engine, rules, pos, depth).await?);
    }

    let mut review = Vec::with_capacity(log.len());
    for (i, entry) in log.entries().iter().enumerate() {
        let before = &evals[i];
        let after = &evals[i + 1];
        let best = before.as_ref().and_then(|e| e.pv.first().copied());
        // Scores are from the side to move, which flips with every ply
        let loss = match (before, after) {
            (Some(b), Some(a)) => Some(b.score.centipawns() + a.score.centipawns()),
            _ => None,
        };
        let grade = match (best, loss) {
            (Some(best), _) if best.same_squares(&entry.mv) => MoveGrade::Best,
            (_, Some(loss)) if loss > GOOD_MOVE_MARGIN => MoveGrade::Poor,
            _ => MoveGrade::Good,
        };
        debug!(ply = i + 1, san = %entry.san, ?grade, ?loss, "move graded");
        review.push(MoveAssessment {
            ply: i as u32 + 1,
            side: entry.side,
            mv: entry.mv,
            san: entry.san.clone(),
            grade,
            best,
            loss,
        });
    }
    Ok(review)
}

/// Terminal positions are scored without the engine.
async fn evaluate(
    engine: &mut dyn AnalysisEngine,
    rules: &dyn Rules,
    pos: &Position,
    depth: u8,
) -> Result<Option<Evaluation>, EngineError> {
    let verdict = rules
        .verdict(pos)
        .map_err(|e| EngineError::Protocol(e.to_string()))?;
    let fixed = |score| {
        Some(Evaluation {
            score,
            depth: 0,
            pv: Vec::new(),
        })
    };
    match verdict {
        Verdict::Checkmate => Ok(fixed(Score::Mate(0))),
        Verdict::Stalemate | Verdict::Draw(_) => Ok(fixed(Score::Centipawns(0))),
        Verdict::Ongoing => match engine.evaluate(pos, depth).await {
            Ok(eval) => Ok(Some(eval)),
            Err(EngineError::Protocol(reason)) => {
                debug!(%reason, "position left unscored");
                Ok(None)
            }
            Err(e) => Err(e),
        },
    }
}

/// Steps back and forth through the positions of a game.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    positions: Vec<Position>,
    moves: Vec<String>,
    index: usize,
}

impl ReplayCursor {
    /// A cursor on the final position of `log`.
    pub fn new(log: &MoveLog) -> Self {
        let positions: Vec<Position> = log.positions().cloned().collect();
        let index = positions.len() - 1;
        Self {
            positions,
            moves: log.entries().iter().map(|e| e.san.clone()).collect(),
            index,
        }
    }

    pub fn position(&self) -> &Position {
        &self.positions[self.index]
    }

    /// Plies played up to the current position.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// SAN of the move that led to the current position.
    pub fn last_move(&self) -> Option<&str> {
        self.index.checked_sub(1).map(|i| self.moves[i].as_str())
    }

    pub fn to_start(&mut self) {
        self.index = 0;
    }

    pub fn to_end(&mut self) {
        self.index = self.moves.len();
    }

    pub fn next(&mut self) -> bool {
        if self.index < self.moves.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod review_tests;
