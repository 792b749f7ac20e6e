//! Properties of the rules oracle over short played-out games.
//!
//! - applying a move always hands the turn to the other side
//! - the applied move is never offered again to the side that played it
//! - a game replayed from its move list reaches the same position

use chess_core::{Color, Position, Rules, StandardRules, Verdict, resolve_uci_move};

const GAMES: &[&[&str]] = &[
    &["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6", "e1g1"],
    &["d2d4", "d7d5", "c2c4", "d5c4", "e2e4", "b7b5", "a2a4", "c7c6"],
    &["f2f3", "e7e5", "g2g4", "d8h4"],
    &["e2e4", "d7d5", "e4e5", "f7f5", "e5f6"],
];

fn play(rules: &StandardRules, moves: &[&str]) -> Vec<Position> {
    let mut positions = vec![Position::startpos()];
    for txt in moves {
        let pos = positions.last().unwrap();
        let mv = resolve_uci_move(rules, pos, txt).unwrap();
        positions.push(rules.apply_move(pos, mv).unwrap());
    }
    positions
}

#[test]
fn test_side_to_move_flips_every_ply() {
    let rules = StandardRules::new();
    for game in GAMES {
        let positions = play(&rules, game);
        for pair in positions.windows(2) {
            assert_eq!(pair[1].side_to_move, pair[0].side_to_move.other());
        }
    }
}

#[test]
fn test_applied_move_not_reoffered_to_mover() {
    let rules = StandardRules::new();
    for game in GAMES {
        let positions = play(&rules, game);
        for (i, txt) in game.iter().enumerate() {
            let after = &positions[i + 1];
            let mover = positions[i].side_to_move;
            let played = resolve_uci_move(&rules, &positions[i], txt).unwrap();
            let replies = rules.legal_moves(after).unwrap();
            assert!(!replies.contains(&played), "{txt} offered again");
            for mv in replies {
                assert_ne!(after.piece_at(mv.from).map(|p| p.color), Some(mover));
            }
        }
    }
}

#[test]
fn test_fools_mate_is_checkmate() {
    let rules = StandardRules::new();
    let positions = play(&rules, GAMES[2]);
    let last = positions.last().unwrap();
    assert_eq!(last.side_to_move, Color::White);
    assert_eq!(rules.verdict(last).unwrap(), Verdict::Checkmate);
}

#[test]
fn test_fen_roundtrip_through_play() {
    let rules = StandardRules::new();
    for game in GAMES {
        for pos in play(&rules, game) {
            assert_eq!(Position::from_fen(&pos.to_fen()).unwrap(), pos);
        }
    }
}
