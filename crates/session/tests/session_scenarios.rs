//! Whole-game scenarios driven through the public session API.

use std::sync::Arc;
use std::time::Duration;

use chess_core::{parse_uci_move, Color, Move, StandardRules, TimeControl};
use game_session::engine::{EngineAnswer, RequestKind, SearchReport};
use game_session::testing::{Scripted, ScriptedEngine};
use game_session::{
    spawn_session, Actor, EngineClient, EngineError, EngineReply, FallbackPolicy, GameController, GameMode, GameSetup,
    Outcome, Phase, SaveLibrary, SessionEvent, SessionOptions,
};
use tokio::sync::mpsc::UnboundedReceiver;

fn mv(txt: &str) -> Move {
    parse_uci_move(txt).unwrap()
}

fn setup(mode: GameMode, time_control: TimeControl) -> GameSetup {
    GameSetup {
        mode,
        time_control,
        ..GameSetup::default()
    }
}

fn scripted(
    setup: &GameSetup,
    fallback: FallbackPolicy,
    script: Vec<Scripted>,
) -> (GameController, UnboundedReceiver<EngineReply>) {
    let (client, replies) = EngineClient::start(Box::new(ScriptedEngine::new(script)));
    let options = SessionOptions {
        fallback,
        ..SessionOptions::default()
    };
    let controller = GameController::new(Arc::new(StandardRules::new()), client, options, setup).unwrap();
    (controller, replies)
}

#[tokio::test]
async fn test_human_opens_and_engine_answers() {
    let setup = setup(GameMode::HumanVsAi { human: Color::White }, TimeControl::new(5, 3));
    let (mut game, mut replies) = scripted(&setup, FallbackPolicy::Resign, vec![Scripted::reply("e7e5")]);

    game.apply_human_move(mv("e2e4")).unwrap();
    let reply = replies.recv().await.unwrap();
    game.handle_engine_reply(reply).unwrap();

    let state = game.state();
    assert_eq!(state.log.uci_moves(), ["e2e4", "e7e5"]);
    assert_eq!(state.ply, 2);
    assert_eq!(game.phase(), Phase::AwaitingMove(Color::White));
    assert_eq!(state.clock.remaining_time(Color::White), Duration::from_secs(303));
    assert_eq!(state.clock.remaining_time(Color::Black), Duration::from_secs(303));

    let sans: Vec<_> = game
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::MoveApplied { san, by, .. } => Some((san, by)),
            _ => None,
        })
        .collect();
    assert_eq!(sans, [("e4".to_string(), Actor::Human), ("e5".to_string(), Actor::Engine)]);
    game.shutdown().await;
}

#[tokio::test]
async fn test_engine_that_never_answers_still_finishes_the_game() {
    // Every request fails, so each move comes from the random fallback
    let setup = setup(GameMode::AiVsAi, TimeControl::unlimited());
    let timeout = Scripted::Fail(EngineError::Timeout(Duration::from_millis(50)));
    let (mut game, mut replies) = scripted(&setup, FallbackPolicy::RandomMove, vec![timeout]);

    for _ in 0..20_000 {
        if game.is_over() {
            break;
        }
        let reply = replies.recv().await.unwrap();
        game.handle_engine_reply(reply).unwrap();
    }

    assert!(game.is_over(), "random game did not finish");
    let state = game.state();
    assert!(state.outcome.is_terminal());
    assert_eq!(state.ply as usize, state.log.len());
    state.log.verify(game.rules()).unwrap();
    game.shutdown().await;
}

#[test]
fn test_checkmate_on_the_last_second_beats_the_flag() {
    let (client, _replies) = EngineClient::offline();
    let setup = setup(GameMode::HumanVsHuman, TimeControl::new(1, 0));
    let mut game =
        GameController::new(Arc::new(StandardRules::new()), client, SessionOptions::default(), &setup).unwrap();
    for txt in ["f2f3", "e7e5", "g2g4"] {
        game.apply_human_move(mv(txt)).unwrap();
    }

    game.advance(Duration::from_secs(60), Some(game_session::Input::HumanMove(mv("d8h4"))))
        .unwrap();
    assert_eq!(game.state().outcome, Outcome::Checkmate { winner: Color::Black });
}

#[tokio::test]
async fn test_replies_for_abandoned_requests_are_ignored() {
    let setup = setup(GameMode::HumanVsAi { human: Color::Black }, TimeControl::unlimited());
    let (mut game, _replies) = scripted(&setup, FallbackPolicy::Resign, vec![Scripted::Hang]);
    let live = game.pending_request().unwrap();

    for id in [live - 1, live + 7] {
        let reply = EngineReply {
            id,
            kind: RequestKind::Move(Color::White),
            result: Ok(EngineAnswer::Search(SearchReport {
                best_move: Some(mv("g1f3")),
                ..SearchReport::default()
            })),
        };
        game.handle_engine_reply(reply).unwrap();
    }
    assert_eq!(game.state().ply, 0);
    assert_eq!(game.phase(), Phase::EngineThinking(Color::White));
    game.shutdown().await;
}

#[tokio::test]
async fn test_saved_game_resumes_from_the_library() {
    let dir = std::env::temp_dir().join(format!("session-scenario-{}", uuid::Uuid::new_v4()));
    let library = SaveLibrary::open(&dir).unwrap();

    let setup = setup(GameMode::HumanVsHuman, TimeControl::new(3, 2));
    let (client, replies) = EngineClient::offline();
    let game = GameController::new(Arc::new(StandardRules::new()), client, SessionOptions::default(), &setup).unwrap();
    let (session, _events, _task) = spawn_session(game, replies, Duration::from_millis(50));
    for txt in ["d2d4", "d7d5", "c2c4"] {
        session.make_move(mv(txt)).await.unwrap();
    }
    let saved = session.snapshot().await.unwrap().state;
    library.save(&saved).unwrap();
    session.shutdown().await;

    let summaries = library.list().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, saved.id);
    assert_eq!(summaries[0].ply, 3);

    let restored = library.load(saved.id).unwrap();
    assert_eq!(restored, saved);
    let (client, _replies) = EngineClient::offline();
    let game =
        GameController::from_state(Arc::new(StandardRules::new()), client, SessionOptions::default(), restored).unwrap();
    assert_eq!(game.phase(), Phase::AwaitingMove(Color::Black));
    assert_eq!(game.state().clock.running_for, Some(Color::Black));

    std::fs::remove_dir_all(&dir).ok();
}
