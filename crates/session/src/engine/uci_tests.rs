use std::future::Future;
use std::task::{Context, Waker};

use super::*;
use chess_core::Move;
use tokio::io::{duplex, split};
use tokio::task::JoinHandle;

use crate::engine::Score;

const HANG_UP: &str = "<eof>";

fn quick() -> EngineTimeouts {
    EngineTimeouts {
        handshake: Duration::from_secs(2),
        search: Duration::from_millis(150),
        grace: Duration::from_millis(150),
    }
}

/// Run a scripted UCI peer on the far end of an in-memory pipe.
/// `respond` maps each received command to the lines written back.
async fn fake_engine<F>(
    options: BTreeMap<String, String>,
    respond: F,
) -> (Result<UciEngine, EngineError>, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Vec<String> + Send + 'static,
{
    fake_engine_with_pipe(8192, options, respond).await
}

/// As [`fake_engine`], with `pipe` bytes of buffering in each direction.
async fn fake_engine_with_pipe<F>(
    pipe: usize,
    options: BTreeMap<String, String>,
    mut respond: F,
) -> (Result<UciEngine, EngineError>, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Vec<String> + Send + 'static,
{
    let (client, server) = duplex(pipe);
    let (client_r, client_w) = split(client);
    let (server_r, mut server_w) = split(server);
    let peer = tokio::spawn(async move {
        let mut seen = Vec::new();
        let mut lines = BufReader::new(server_r).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            seen.push(line.clone());
            for out in respond(&line) {
                if out == HANG_UP {
                    return seen;
                }
                if server_w.write_all(format!("{out}\n").as_bytes()).await.is_err() {
                    return seen;
                }
            }
            if line == "quit" {
                break;
            }
        }
        seen
    });
    let engine = UciEngine::connect(client_r, client_w, &options, quick()).await;
    (engine, peer)
}

fn handshake(line: &str) -> Vec<String> {
    match line {
        "uci" => vec!["id name Fake 1.0".into(), "id author nobody".into(), "uciok".into()],
        "isready" => vec!["readyok".into()],
        _ => Vec::new(),
    }
}

fn cooperative(line: &str) -> Vec<String> {
    if line.starts_with("go") {
        return vec![
            "info depth 1 score cp 10 pv d2d4".into(),
            "info depth 3 score cp 25 pv e2e4 e7e5".into(),
            "bestmove e2e4 ponder e7e5".into(),
        ];
    }
    handshake(line)
}

fn mv(txt: &str) -> Move {
    chess_core::parse_uci_move(txt).unwrap()
}

#[tokio::test]
async fn test_handshake_reads_name_and_sends_options() {
    let options = BTreeMap::from([("Skill Level".to_string(), "5".to_string())]);
    let (engine, peer) = fake_engine(options, cooperative).await;
    let mut engine = engine.unwrap();
    assert_eq!(engine.name(), "Fake 1.0");

    engine.shutdown().await;
    let seen = peer.await.unwrap();
    assert_eq!(
        seen,
        ["uci", "setoption name Skill Level value 5", "isready", "quit"]
    );
}

#[tokio::test]
async fn test_best_move_collects_search_info() {
    let (engine, peer) = fake_engine(BTreeMap::new(), cooperative).await;
    let mut engine = engine.unwrap();

    let report = engine
        .best_move(&Position::startpos(), SearchBudget::depth(4))
        .await
        .unwrap();
    assert_eq!(report.best_move, Some(mv("e2e4")));
    assert_eq!(report.score, Some(Score::Centipawns(25)));
    assert_eq!(report.depth, Some(3));
    assert_eq!(report.pv, vec![mv("e2e4"), mv("e7e5")]);

    engine.shutdown().await;
    let seen = peer.await.unwrap();
    assert!(seen.contains(&position_command(&Position::startpos())));
    assert!(seen.contains(&"go depth 4".to_string()));
}

#[tokio::test]
async fn test_evaluate_returns_score_and_line() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), cooperative).await;
    let mut engine = engine.unwrap();
    let eval = engine.evaluate(&Position::startpos(), 15).await.unwrap();
    assert_eq!(eval.score, Score::Centipawns(25));
    assert_eq!(eval.depth, 3);
    assert_eq!(eval.pv.len(), 2);
}

#[tokio::test]
async fn test_evaluate_without_score_is_protocol_error() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), |line| {
        if line.starts_with("go") {
            return vec!["bestmove e2e4".into()];
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();
    let err = engine.evaluate(&Position::startpos(), 5).await.unwrap_err();
    assert!(matches!(err, EngineError::Protocol(_)));
}

#[tokio::test]
async fn test_no_move_reply() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), |line| {
        if line.starts_with("go") {
            return vec!["bestmove (none)".into()];
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();
    let report = engine
        .best_move(&Position::startpos(), SearchBudget::depth(2))
        .await
        .unwrap();
    assert_eq!(report.best_move, None);
}

#[tokio::test]
async fn test_timeout_then_stream_stays_usable() {
    let mut searches = 0;
    let (engine, _peer) = fake_engine(BTreeMap::new(), move |line| {
        if line.starts_with("go") {
            searches += 1;
            // The first search never finishes on its own
            if searches == 1 {
                return Vec::new();
            }
            return vec!["bestmove g1f3".into()];
        }
        if line == "stop" {
            return vec!["bestmove a2a3".into()];
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();

    let err = engine
        .best_move(&Position::startpos(), SearchBudget::depth(30))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Timeout(Duration::from_millis(150)));

    // The late a2a3 was drained; the next answer belongs to the next request
    let report = engine
        .best_move(&Position::startpos(), SearchBudget::depth(1))
        .await
        .unwrap();
    assert_eq!(report.best_move, Some(mv("g1f3")));
}

#[tokio::test]
async fn test_request_dropped_while_sending_go_is_drained() {
    // Room for the position command and a few bytes of `go`
    let start = Position::startpos();
    let pipe = position_command(&start).len() + 1 + 4;
    let mut searches = 0;
    let (engine, _peer) = fake_engine_with_pipe(pipe, BTreeMap::new(), move |line| {
        if line.starts_with("go") {
            searches += 1;
            let best = if searches == 1 { "a2a3" } else { "g1f3" };
            return vec![format!("bestmove {best}")];
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();

    {
        let mut search = engine.best_move(&start, SearchBudget::depth(30));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(search.as_mut().poll(&mut cx).is_pending());
    }

    let report = engine.best_move(&start, SearchBudget::depth(1)).await.unwrap();
    assert_eq!(report.best_move, Some(mv("g1f3")));
}

#[tokio::test]
async fn test_engine_ignoring_stop_becomes_unavailable() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), |line| {
        if line.starts_with("go") || line == "stop" {
            return Vec::new();
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();

    let err = engine
        .best_move(&Position::startpos(), SearchBudget::depth(30))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
    let again = engine
        .best_move(&Position::startpos(), SearchBudget::depth(1))
        .await
        .unwrap_err();
    assert!(matches!(again, EngineError::Unavailable(_)));
}

#[tokio::test]
async fn test_engine_exit_is_unavailable() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), |line| {
        if line.starts_with("go") {
            return vec![HANG_UP.into()];
        }
        handshake(line)
    })
    .await;
    let mut engine = engine.unwrap();
    let err = engine
        .best_move(&Position::startpos(), SearchBudget::depth(3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
}

#[tokio::test]
async fn test_silent_engine_fails_handshake() {
    let (engine, _peer) = fake_engine(BTreeMap::new(), |_| Vec::new()).await;
    assert!(matches!(engine, Err(EngineError::Timeout(_))));
}

#[tokio::test]
async fn test_missing_binary_is_unavailable() {
    let path = Path::new("/definitely/not/an/engine");
    let err = UciEngine::spawn(path, &BTreeMap::new(), quick()).await.err();
    assert!(matches!(err, Some(EngineError::Unavailable(_))));
}
