//! Text rendering of boards, clocks and session events.

use chess_core::{sq, Color, Position};
use game_session::review::{MoveAssessment, MoveGrade};
use game_session::{ChessClock, SessionEvent, SessionState};

pub fn board(pos: &Position) -> String {
    let mut out = String::new();
    for rank in (0..8).rev() {
        out.push_str(&format!("{} ", rank + 1));
        for file in 0..8 {
            let ch = sq(file, rank)
                .and_then(|s| pos.piece_at(s))
                .map(|p| p.fen_char())
                .unwrap_or('.');
            out.push(' ');
            out.push(ch);
        }
        out.push('\n');
    }
    out.push_str("   a b c d e f g h");
    out
}

pub fn clock(clock: &ChessClock) -> String {
    if !clock.enabled {
        return "no clock".to_string();
    }
    let side = |color: Color| {
        let marker = if clock.running_for == Some(color) { "*" } else { " " };
        format!("{marker}{color} {}", ChessClock::format_time(clock.remaining_time(color)))
    };
    format!("{}   {}", side(Color::White), side(Color::Black))
}

pub fn state(state: &SessionState) -> String {
    format!(
        "{}\n{}\n{} to move, ply {}",
        board(&state.position),
        clock(&state.clock),
        state.side_to_move(),
        state.ply
    )
}

/// One-line description of an event, or `None` for events shown otherwise.
pub fn event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::SessionStarted { mode, .. } => format!("new game: {mode}"),
        SessionEvent::MoveApplied { ply, side, san, .. } => {
            let number = (ply + 1) / 2;
            match side {
                Color::White => format!("{number}. {san}"),
                Color::Black => format!("{number}... {san}"),
            }
        }
        SessionEvent::EngineThinking { side, .. } => format!("engine thinking for {side}..."),
        SessionEvent::HintReady { .. } => return None,
        SessionEvent::EvaluationReady {
            evaluation,
            white_centipawns,
            ..
        } => format!(
            "evaluation {:+.2} (depth {})",
            f64::from(*white_centipawns) / 100.0,
            evaluation.depth
        ),
        SessionEvent::DrawOffered(side) => format!("{side} offers a draw"),
        SessionEvent::MoveUndone { ply, .. } => format!("move taken back, now at ply {ply}"),
        SessionEvent::ClockExpired(side) => format!("{side}'s flag fell"),
        SessionEvent::EngineUnavailable { reason, side, .. } => match side {
            Some(side) => format!("engine failed to move for {side}: {reason}"),
            None => format!("engine request failed: {reason}"),
        },
        SessionEvent::FallbackApplied { side, policy } => format!("fallback for {side}: {policy:?}"),
        SessionEvent::Paused => "paused".to_string(),
        SessionEvent::Resumed => "resumed".to_string(),
        SessionEvent::GameEnded(outcome) => format!("game over: {outcome} ({})", outcome.result_string()),
    };
    Some(line)
}

pub fn assessment(a: &MoveAssessment) -> String {
    let grade = match a.grade {
        MoveGrade::Best => "best",
        MoveGrade::Good => "good",
        MoveGrade::Poor => "poor",
    };
    let mut line = format!("{:>3} {:<8} {grade}", a.ply, a.san);
    if let Some(loss) = a.loss {
        line.push_str(&format!("  loss {loss}cp"));
    }
    if a.grade == MoveGrade::Poor {
        if let Some(best) = a.best {
            line.push_str(&format!("  best {best}"));
        }
    }
    line
}
