//! Sparring UCI engine: plays a uniformly random legal move.
//!
//! Stands in for Stockfish when none is installed and gives the session's
//! integration tests a real process to talk to. stdout carries only UCI;
//! logs go to stderr.

use chess_core::{Position, Rules, SearchBudget, StandardRules, Verdict, parse_position_command};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const NAME: &str = "ML-chess Sparring 0.1";

struct Sparring {
    rules: StandardRules,
    pos: Position,
    rng: StdRng,
}

impl Sparring {
    fn new() -> Self {
        Self {
            rules: StandardRules::new(),
            pos: Position::startpos(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Handle one input line. Returns the lines to print and whether to quit.
    fn handle(&mut self, line: &str) -> (Vec<String>, bool) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = parts.split_first() else {
            return (Vec::new(), false);
        };

        let out = match cmd {
            "uci" => vec![
                format!("id name {NAME}"),
                "id author ML-chess".to_string(),
                "option name Seed type spin default 0 min 0 max 2147483647".to_string(),
                "uciok".to_string(),
            ],
            "isready" => vec!["readyok".to_string()],
            "setoption" => {
                self.set_option(args);
                Vec::new()
            }
            "ucinewgame" => {
                self.pos = Position::startpos();
                Vec::new()
            }
            "position" => {
                match parse_position_command(&self.rules, args) {
                    Ok(pos) => self.pos = pos,
                    Err(e) => warn!(error = %e, "ignoring bad position command"),
                }
                Vec::new()
            }
            "go" => self.go(args),
            // Searches finish immediately, so there is never anything to stop
            "stop" => Vec::new(),
            "quit" => return (Vec::new(), true),
            other => {
                debug!(command = other, "ignoring unknown command");
                Vec::new()
            }
        };
        (out, false)
    }

    fn set_option(&mut self, args: &[&str]) {
        // setoption name <id> [value <x>]
        let value_at = args.iter().position(|&a| a == "value").unwrap_or(args.len());
        let name = args.get(1..value_at).unwrap_or_default().join(" ");
        let value = args.get(value_at + 1..).unwrap_or_default().join(" ");
        match name.as_str() {
            "Seed" => match value.parse::<u64>() {
                Ok(0) => self.rng = StdRng::from_entropy(),
                Ok(seed) => self.rng = StdRng::seed_from_u64(seed),
                Err(_) => warn!(%value, "seed is not a number"),
            },
            _ => debug!(%name, %value, "option accepted and ignored"),
        }
    }

    fn go(&mut self, args: &[&str]) -> Vec<String> {
        let budget = SearchBudget::from_go_args(args);
        let legal = match self.rules.legal_moves(&self.pos) {
            Ok(moves) => moves,
            Err(e) => {
                warn!(error = %e, "position has no legal moves to offer");
                Vec::new()
            }
        };
        let Some(mv) = legal.choose(&mut self.rng) else {
            let verdict = self.rules.verdict(&self.pos).unwrap_or(Verdict::Ongoing);
            info!(?verdict, "no legal move");
            return vec!["bestmove (none)".to_string()];
        };
        debug!(?budget, choice = %mv, of = legal.len(), "move chosen");
        vec![format!("info depth 1 score cp 0 pv {mv}"), format!("bestmove {mv}")]
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut engine = Sparring::new();
    info!("{NAME} ready");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let (out, quit) = engine.handle(line.trim());
        for reply in out {
            writeln!(stdout, "{reply}").ok();
        }
        stdout.flush().ok();
        if quit {
            break;
        }
    }
    info!("sparring engine exiting");
}
