//! Terminal front-end for a chess session.
//!
//! Reads moves and commands from stdin, prints the board and session
//! events to stdout. Logs go to stderr.

mod commands;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chess_core::{Color, StandardRules};
use commands::Command;
use game_session::review::{review_game, ReplayCursor};
use game_session::{
    spawn_session, AppConfig, EngineClient, EngineReply, GameController, GameMode, SaveLibrary, SessionEvent,
    SessionHandle, SessionSnapshot, StatsBook, UciEngine,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("ML-chess console");
    println!();
    println!("Usage:");
    println!("  chess_console [--config <file.toml>] [--sparring <engine binary>]");
    println!();
    println!("Without --config every setting takes its default: human (White) vs engine,");
    println!("medium difficulty, no clock, Stockfish from the working directory or PATH.");
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    sparring: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--config needs a path");
                };
                parsed.config = Some(PathBuf::from(path));
                i += 1;
            }
            "--sparring" | "-s" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--sparring needs the engine binary");
                };
                parsed.sparring = Some(PathBuf::from(path));
                i += 1;
            }
            "--help" | "-h" => return Ok(None),
            other => bail!("unknown argument {other:?}"),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&raw)? else {
        print_usage();
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    let engine_path = args.sparring.clone().unwrap_or_else(|| config.engine.resolved_path());
    let library = SaveLibrary::open(&config.storage.directory)
        .with_context(|| format!("opening save library {}", config.storage.directory.display()))?;
    let stats_path = library.stats_path();

    let (client, replies) = start_engine(&config, &engine_path).await;
    let controller = GameController::new(
        Arc::new(StandardRules::new()),
        client,
        config.session_options(),
        &config.game.setup(),
    )?;
    let initial = controller.state().clone();
    let (session, events, task) = spawn_session(controller, replies, config.game.tick_interval());

    println!("{}", render::state(&initial));
    let printer = tokio::spawn(print_events(
        events,
        initial.mode,
        stats_path.clone(),
        config.storage.player.clone(),
    ));

    let console = Console {
        session: session.clone(),
        config,
        engine_path,
        library,
        stats_path,
    };
    let result = console.run().await;

    session.shutdown().await;
    if let Err(e) = task.await {
        warn!(error = %e, "session task failed");
    }
    printer.abort();
    result
}

async fn start_engine(config: &AppConfig, path: &Path) -> (EngineClient, mpsc::UnboundedReceiver<EngineReply>) {
    match UciEngine::spawn(path, &config.engine.options, config.engine.timeouts()).await {
        Ok(engine) => {
            info!(engine = %path.display(), "engine ready");
            EngineClient::start(Box::new(engine))
        }
        Err(e) => {
            warn!(engine = %path.display(), error = %e, "engine unavailable");
            println!("engine unavailable ({e}); engine moves will use the fallback policy");
            EngineClient::offline()
        }
    }
}

async fn print_events(
    mut events: broadcast::Receiver<SessionEvent>,
    mut mode: GameMode,
    stats_path: PathBuf,
    player: String,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "event printer fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if let Some(line) = render::event(&event) {
            println!("{line}");
        }
        match event {
            SessionEvent::SessionStarted { mode: started, .. } => mode = started,
            SessionEvent::MoveApplied { position, .. } | SessionEvent::MoveUndone { position, .. } => {
                println!("{}", render::board(&position));
            }
            SessionEvent::GameEnded(outcome) => {
                if let Err(e) = record_result(&stats_path, &player, mode, outcome) {
                    warn!(error = %e, "could not update player stats");
                }
            }
            _ => {}
        }
    }
}

fn record_result(path: &Path, player: &str, mode: GameMode, outcome: game_session::Outcome) -> Result<()> {
    let mut book = StatsBook::load(path)?;
    if book.record(player, mode, outcome) {
        book.save(path)?;
        let stats = book.get(player);
        println!("{player}: {} wins, {} losses, {} ties", stats.wins, stats.losses, stats.ties);
    }
    Ok(())
}

struct Console {
    session: SessionHandle,
    config: AppConfig,
    engine_path: PathBuf,
    library: SaveLibrary,
    stats_path: PathBuf,
}

impl Console {
    async fn run(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("reading stdin")? {
            let command = match commands::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(msg) => {
                    println!("{msg}");
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.execute(command).await {
                println!("error: {e:#}");
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        let session = &self.session;
        match command {
            Command::Move(mv) => session.make_move(mv).await?,
            Command::Hint => {
                let mv = session.hint().await?;
                println!("hint: {mv}");
            }
            Command::Undo => session.undo().await?,
            Command::Resign => {
                let snapshot = session.snapshot().await?;
                session.resign(acting_side(&snapshot)).await?;
            }
            Command::Draw => {
                let snapshot = session.snapshot().await?;
                session.offer_draw(acting_side(&snapshot)).await?;
            }
            Command::Accept => {
                let snapshot = session.snapshot().await?;
                let side = match (snapshot.state.mode, snapshot.state.draw_offer) {
                    (GameMode::HumanVsHuman, Some(offerer)) => offerer.other(),
                    _ => acting_side(&snapshot),
                };
                session.accept_draw(side).await?;
            }
            Command::Pause => session.pause().await?,
            Command::Resume => session.resume().await?,
            Command::Retry => session.retry_engine().await?,
            Command::Eval(depth) => {
                session.evaluate(depth).await?;
            }
            Command::Save => {
                let snapshot = session.snapshot().await?;
                let id = self.library.save(&snapshot.state)?;
                println!("saved as {id}");
            }
            Command::Load(id) => {
                let id = id.parse().with_context(|| format!("{id:?} is not a save id"))?;
                let bytes = self.library.load_bytes(id)?;
                session.load(bytes).await?;
                println!("{}", render::state(&session.snapshot().await?.state));
            }
            Command::List => {
                let saves = self.library.list()?;
                if saves.is_empty() {
                    println!("no saved games");
                }
                for s in saves {
                    println!(
                        "{}  {}  ply {}  {}  {}",
                        s.id,
                        s.saved_at.format("%Y-%m-%d %H:%M"),
                        s.ply,
                        s.mode,
                        s.outcome
                    );
                }
            }
            Command::New => session.new_game(self.config.game.setup()).await?,
            Command::Review => self.review().await?,
            Command::Replay(ply) => {
                let state = session.snapshot().await?.state;
                let mut cursor = ReplayCursor::new(&state.log);
                cursor.to_start();
                while cursor.index() < ply && cursor.next() {}
                println!("{}", render::board(cursor.position()));
                match cursor.last_move() {
                    Some(san) => println!("after ply {}: {san}", cursor.index()),
                    None => println!("starting position"),
                }
            }
            Command::Board => println!("{}", render::state(&session.snapshot().await?.state)),
            Command::Stats => {
                let stats = StatsBook::load(&self.stats_path)?.get(&self.config.storage.player);
                println!(
                    "{}: {} games, {} wins, {} losses, {} ties",
                    self.config.storage.player,
                    stats.games(),
                    stats.wins,
                    stats.losses,
                    stats.ties
                );
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => {}
        }
        Ok(())
    }

    /// Grade the game so far with a separate engine process.
    async fn review(&self) -> Result<()> {
        let state = self.session.snapshot().await?.state;
        if state.log.is_empty() {
            println!("no moves to review");
            return Ok(());
        }
        let engine = &self.config.engine;
        let mut analyst = UciEngine::spawn(&self.engine_path, &engine.options, engine.timeouts())
            .await
            .context("starting the review engine")?;
        println!("reviewing {} moves at depth {}...", state.log.len(), engine.analysis_depth);
        let result = review_game(&mut analyst, &StandardRules::new(), &state.log, engine.analysis_depth).await;
        game_session::AnalysisEngine::shutdown(&mut analyst).await;
        for assessment in result? {
            println!("{}", render::assessment(&assessment));
        }
        Ok(())
    }
}

/// The side a console command speaks for.
fn acting_side(snapshot: &SessionSnapshot) -> Color {
    match snapshot.state.mode {
        GameMode::HumanVsAi { human } => human,
        _ => snapshot.state.side_to_move(),
    }
}
