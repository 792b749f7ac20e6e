//! Console command parsing.

use chess_core::{parse_uci_move, Move};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move(Move),
    Hint,
    Undo,
    Resign,
    Draw,
    Accept,
    Pause,
    Resume,
    Retry,
    Eval(Option<u8>),
    Save,
    Load(String),
    List,
    New,
    Review,
    Replay(usize),
    Board,
    Stats,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&first, rest)) = parts.split_first() else {
        return Ok(None);
    };
    let word = first.to_lowercase();

    let command = match word.as_str() {
        "hint" => Command::Hint,
        "undo" => Command::Undo,
        "resign" => Command::Resign,
        "draw" => Command::Draw,
        "accept" => Command::Accept,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "retry" => Command::Retry,
        "eval" => match rest.first() {
            None => Command::Eval(None),
            Some(depth) => Command::Eval(Some(
                depth.parse().map_err(|_| format!("bad depth {depth:?}"))?,
            )),
        },
        "save" => Command::Save,
        "load" => match rest.first() {
            Some(id) => Command::Load(id.to_string()),
            None => return Err("usage: load <id>".to_string()),
        },
        "list" => Command::List,
        "new" => Command::New,
        "review" => Command::Review,
        "replay" => match rest.first().map(|n| n.parse::<usize>()) {
            Some(Ok(ply)) => Command::Replay(ply),
            _ => return Err("usage: replay <ply>".to_string()),
        },
        "board" => Command::Board,
        "stats" => Command::Stats,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => match parse_uci_move(&word) {
            Ok(mv) => Command::Move(mv),
            Err(_) => return Err(format!("unknown command {first:?}, try 'help'")),
        },
    };
    Ok(Some(command))
}

pub const HELP: &str = "\
commands:
  <move>        play a move in UCI notation (e2e4, e7e8q)
  hint          ask the engine for a suggestion
  undo          take back the last move
  resign        resign the game
  draw          offer a draw
  accept        accept the opponent's draw offer
  pause/resume  stop or restart the clocks
  retry         ask a stalled engine again
  eval [depth]  evaluate the current position
  save          save the game to the library
  load <id>     load a saved game
  list          list saved games
  new           start a new game
  review        grade every move of the game
  replay <ply>  show the board after a given ply
  board         show the board
  stats         show your results
  quit          leave";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moves_and_words() {
        assert_eq!(parse("e2e4").unwrap(), Some(Command::Move(parse_uci_move("e2e4").unwrap())));
        assert_eq!(parse("  E7E8Q ").unwrap(), Some(Command::Move(parse_uci_move("e7e8q").unwrap())));
        assert_eq!(parse("hint").unwrap(), Some(Command::Hint));
        assert_eq!(parse("Quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("").unwrap(), None);
    }

    #[test]
    fn test_arguments() {
        assert_eq!(parse("eval").unwrap(), Some(Command::Eval(None)));
        assert_eq!(parse("eval 12").unwrap(), Some(Command::Eval(Some(12))));
        assert!(parse("eval deep").is_err());
        assert_eq!(parse("load abc").unwrap(), Some(Command::Load("abc".into())));
        assert!(parse("load").is_err());
        assert_eq!(parse("replay 4").unwrap(), Some(Command::Replay(4)));
        assert!(parse("replay").is_err());
    }

    #[test]
    fn test_unknown() {
        assert!(parse("castle").is_err());
        assert!(parse("e2e9").is_err());
    }
}
