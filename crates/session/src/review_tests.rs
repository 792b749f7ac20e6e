use super::*;
use crate::clock::ChessClock;
use crate::move_log::{san, LogEntry};
use crate::testing::{Scripted, ScriptedEngine};
use chess_core::{resolve_uci_move, StandardRules, TimeControl};
use chrono::Utc;

fn log_of(moves: &[&str]) -> MoveLog {
    let rules = StandardRules::new();
    let mut log = MoveLog::new(Position::startpos());
    for txt in moves {
        let pos = log.current_position().clone();
        let mv = resolve_uci_move(&rules, &pos, txt).unwrap();
        log.push(LogEntry {
            mv,
            side: pos.side_to_move,
            san: san(&rules, &pos, mv).unwrap(),
            position: rules.apply_move(&pos, mv).unwrap(),
            clock_before: ChessClock::new(TimeControl::unlimited()),
            played_at: Utc::now(),
        });
    }
    log
}

#[tokio::test]
async fn test_grades_best_good_poor() {
    let log = log_of(&["e2e4", "e7e5", "g1f3"]);
    let mut engine = ScriptedEngine::new([
        Scripted::scored("e2e4", 30),
        Scripted::scored("c7c5", -20),
        Scripted::scored("d2d4", 40),
        Scripted::scored("b8c6", 300),
    ]);

    let review = review_game(&mut engine, &StandardRules::new(), &log, 12).await.unwrap();
    let grades: Vec<MoveGrade> = review.iter().map(|a| a.grade).collect();
    assert_eq!(grades, [MoveGrade::Best, MoveGrade::Good, MoveGrade::Poor]);
    assert_eq!(review[1].loss, Some(20));
    assert_eq!(review[2].loss, Some(340));
    assert_eq!(review[2].best.unwrap().to_string(), "d2d4");
    assert_eq!(review[0].san, "e4");
}

#[tokio::test]
async fn test_checkmate_position_not_sent_to_engine() {
    let log = log_of(&["f2f3", "e7e5", "g2g4", "d8h4"]);
    let mut engine = ScriptedEngine::new([
        Scripted::scored("e2e4", 20),
        Scripted::scored("d7d5", -60),
        Scripted::scored("e2e4", 90),
        Scripted::scored("d8h4", 9000),
    ]);
    let calls = engine.calls();

    let review = review_game(&mut engine, &StandardRules::new(), &log, 8).await.unwrap();
    assert_eq!(calls.lock().unwrap().len(), 4);
    assert_eq!(review[3].grade, MoveGrade::Best);
    assert_eq!(review[0].grade, MoveGrade::Good);
}

#[tokio::test]
async fn test_unscored_positions_grade_good() {
    let log = log_of(&["a2a3", "h7h6"]);
    let mut engine = ScriptedEngine::new([
        Scripted::reply("e2e4"),
        Scripted::reply("e7e5"),
        Scripted::reply("e2e4"),
    ]);
    let review = review_game(&mut engine, &StandardRules::new(), &log, 8).await.unwrap();
    assert!(review.iter().all(|a| a.grade == MoveGrade::Good && a.loss.is_none()));
}

#[tokio::test]
async fn test_engine_loss_aborts_review() {
    let log = log_of(&["e2e4"]);
    let mut engine = ScriptedEngine::new([Scripted::scored("e2e4", 10)]);
    let err = review_game(&mut engine, &StandardRules::new(), &log, 8).await.unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[test]
fn test_replay_cursor_walks_game() {
    let log = log_of(&["e2e4", "e7e5", "g1f3"]);
    let mut cursor = ReplayCursor::new(&log);
    assert_eq!(cursor.index(), 3);
    assert_eq!(cursor.last_move(), Some("Nf3"));
    assert!(!cursor.next());

    cursor.to_start();
    assert_eq!(cursor.position(), &Position::startpos());
    assert_eq!(cursor.last_move(), None);
    assert!(!cursor.prev());

    assert!(cursor.next());
    assert_eq!(cursor.position(), log.position_before(1));
    assert_eq!(cursor.last_move(), Some("e4"));

    cursor.to_end();
    assert_eq!(cursor.position(), log.current_position());
    assert_eq!(cursor.len(), 3);
}
