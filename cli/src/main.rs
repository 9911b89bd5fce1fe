// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duelboard CLI - Command-line interface for headless play
//!
//! This binary drives a checkers or snake-and-ladders game from the
//! terminal, either against the built-in AI or against a simulated friend
//! connected over an in-process link.

mod render;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use duelboard_core::{CaptureGreedy, Coord, GameEvent, BOARD_SIZE};
use duelboard_network::config::{load_config, load_config_from};
use duelboard_network::{
    new_game_id, CheckersCoordinator, ConnectionTracker, EventKind, LocalLink, MessageRouter,
    Phase, SessionConfig, SnakesCoordinator, SyncMessage, TapOutcome,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "duelboard-cli", about = "Checkers and snake-and-ladders in the terminal", version)]
struct Args {
    /// Which game to play
    #[arg(short, long, value_enum, default_value_t = GameKind::Checkers)]
    game: GameKind,

    /// Who plays the other side
    #[arg(short, long, value_enum, default_value_t = OpponentKind::Ai)]
    opponent: OpponentKind,

    /// Seed for dice and AI choices
    #[arg(long)]
    seed: Option<u64>,

    /// Let the AI play the local side too
    #[arg(long)]
    auto: bool,

    /// Override the configured AI pause, in milliseconds
    #[arg(long)]
    ai_delay_ms: Option<u64>,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum GameKind {
    Checkers,
    Snakes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OpponentKind {
    /// Built-in AI
    Ai,
    /// Simulated friend over an in-process link
    Loopback,
}

/// A line of checkers input
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Tap(Coord),
    Move(Coord, Coord),
    Hint,
    Quit,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config().context("Failed to load session config")?,
    };
    if let Some(ms) = args.ai_delay_ms {
        config.ai_delay_ms = ms;
    }
    tracing::debug!(?config, "Session config");

    match args.game {
        GameKind::Checkers => run_checkers(&args, &config).await,
        GameKind::Snakes => run_snakes(&args, &config).await,
    }
}

fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

/// Open the simulated friend's link, returning our end's sender and a
/// subscription to `kinds` fed from the link
async fn connect_friend(
    config: &SessionConfig,
    kinds: &[EventKind],
) -> Result<(duelboard_network::messenger::LinkSender, LocalLink, mpsc::UnboundedReceiver<SyncMessage>, ConnectionTracker)> {
    let tracker = ConnectionTracker::new(config.reconnect_policy());
    println!("Connecting to {} ...", config.server_url);
    let (ours, theirs) = tracker
        .connect_with_retry(|| async { Ok(LocalLink::pair()) })
        .await?;
    println!("Connected to simulated friend");

    let (sender, mut receiver) = ours.into_split();
    let mut router = MessageRouter::new();
    let inbound = router.subscribe_many(kinds);
    tokio::spawn(async move {
        while let Some(msg) = receiver.recv().await {
            router.dispatch(msg);
        }
    });
    Ok((sender, theirs, inbound, tracker))
}

async fn next_inbound(rx: &mut Option<mpsc::UnboundedReceiver<SyncMessage>>) -> Option<SyncMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<Option<String>> {
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

/// Run a checkers game until it ends or input closes
async fn run_checkers(args: &Args, config: &SessionConfig) -> Result<()> {
    let game_id = new_game_id();
    let mut auto_policy = CaptureGreedy::new(rng_for(args.seed, 1));

    let (mut game, mut inbound, tracker) = match args.opponent {
        OpponentKind::Ai => {
            let ai = CaptureGreedy::new(rng_for(args.seed, 0));
            (CheckersCoordinator::vs_ai(Box::new(ai)).with_config(config), None, None)
        }
        OpponentKind::Loopback => {
            let (sender, theirs, inbound, tracker) = connect_friend(config, &EventKind::CHECKERS).await?;
            spawn_checkers_friend(game_id.clone(), theirs, config.clone(), rng_for(args.seed, 2));
            let game = CheckersCoordinator::host(game_id, Box::new(sender)).with_config(config);
            (game, Some(inbound), Some(tracker))
        }
    };

    let mut events = game.subscribe();
    if let Some(rx) = inbound.as_mut() {
        game.invite("you", "friend")?;
        println!("Waiting for friend to accept the invite ...");
        while !game.handshake().is_accepted() {
            let msg = rx.recv().await.ok_or_else(|| anyhow!("Friend left before accepting"))?;
            game.handle_inbound(msg).context("Invite exchange failed")?;
        }
    }
    game.start("you", "friend")?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    println!("\n{}", render::render_board(game.board(), &[]));

    loop {
        if let Some(outcome) = game.outcome() {
            println!("Game over: {} wins", outcome.winner);
            break;
        }

        if game.is_ai_turn() {
            let moves = game.play_ai_turn_paced().await?;
            for mv in moves {
                println!("AI plays {}", mv);
            }
            println!("\n{}", render::render_board(game.board(), &[]));
            continue;
        }

        let local_turn = game.is_local_turn();
        if local_turn {
            if game.local_candidates().is_empty() {
                println!("No legal moves left for {}", game.local_side());
                break;
            }
            if args.auto {
                for mv in game.play_policy_turn(&mut auto_policy)? {
                    println!("You play {}", mv);
                }
                println!("\n{}", render::render_board(game.board(), &[]));
                continue;
            }
            println!("Your move: 'row,col' to select, 'row,col row,col' to move, 'hint', 'quit'");
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\nReceived Ctrl+C, shutting down...");
                break;
            }

            line = next_line(&mut stdin), if local_turn => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => apply_command(&mut game, cmd)?,
                    Err(e) => eprintln!("{}", e),
                }
            }

            msg = next_inbound(&mut inbound) => {
                let Some(msg) = msg else {
                    println!("Friend disconnected");
                    if let Some(tracker) = &tracker {
                        tracker.handle_disconnection();
                    }
                    break;
                };
                match game.handle_inbound(msg) {
                    Ok(0) => {}
                    Ok(_) => println!("\n{}", render::render_board(game.board(), &[])),
                    Err(e) => return Err(anyhow!(e).context("Lost sync with friend")),
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            if let GameEvent::PieceCaptured { at, owner } = event {
                println!("{} piece captured at {}", owner, at);
            }
        }
    }

    Ok(())
}

fn apply_command(game: &mut CheckersCoordinator, cmd: Command) -> Result<()> {
    match cmd {
        Command::Hint => {
            for mv in game.local_candidates() {
                println!("  {}", mv);
            }
        }
        Command::Tap(at) => {
            let outcome = game.tap(at)?;
            report_tap(game, outcome);
        }
        Command::Move(from, to) => {
            let chained = matches!(game.phase(), Phase::AwaitingDestination { chained: true, .. });
            if !chained {
                game.tap(from)?;
            }
            let outcome = game.tap(to)?;
            report_tap(game, outcome);
        }
        Command::Quit => {}
    }
    Ok(())
}

fn report_tap(game: &CheckersCoordinator, outcome: TapOutcome) {
    match outcome {
        TapOutcome::Ignored => println!("Nothing to do there"),
        TapOutcome::Selected(moves) => {
            let targets: Vec<Coord> = moves.iter().map(|m| m.to).collect();
            println!("\n{}", render::render_board(game.board(), &targets));
        }
        TapOutcome::Moved { mv, continues } => {
            println!("You play {}", mv);
            if continues {
                println!("Capture again with the same piece");
            }
            println!("\n{}", render::render_board(game.board(), &[]));
        }
    }
}

fn parse_coord(text: &str) -> Result<Coord> {
    let (row, col) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected 'row,col', got '{}'", text))?;
    let row: u8 = row.trim().parse().with_context(|| format!("Bad row in '{}'", text))?;
    let col: u8 = col.trim().parse().with_context(|| format!("Bad column in '{}'", text))?;
    if row >= BOARD_SIZE || col >= BOARD_SIZE {
        return Err(anyhow!("{},{} is off the board", row, col));
    }
    Ok(Coord::new(row, col))
}

fn parse_command(line: &str) -> Result<Command> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["quit"] | ["q"] => Ok(Command::Quit),
        ["hint"] | ["moves"] => Ok(Command::Hint),
        [at] => Ok(Command::Tap(parse_coord(at)?)),
        [from, to] => Ok(Command::Move(parse_coord(from)?, parse_coord(to)?)),
        _ => Err(anyhow!("Unrecognized input '{}'", line)),
    }
}

/// Simulated friend: a guest coordinator driven by the AI policy
fn spawn_checkers_friend(game_id: String, link: LocalLink, config: SessionConfig, rng: StdRng) {
    tokio::spawn(async move {
        let (sender, mut receiver) = link.into_split();
        let mut friend = CheckersCoordinator::guest(game_id, Box::new(sender)).with_config(&config);
        let mut policy = CaptureGreedy::new(rng);

        while let Some(msg) = receiver.recv().await {
            if let Err(e) = friend.handle_inbound(msg) {
                tracing::error!(error = %e, "Friend lost sync");
                break;
            }
            if friend.handshake().pending_invite().is_some() {
                if let Err(e) = friend.accept_invite() {
                    tracing::error!(error = %e, "Friend could not accept the invite");
                    break;
                }
            }
            if friend.is_local_turn() {
                tokio::time::sleep(config.ai_delay()).await;
                if let Err(e) = friend.play_policy_turn(&mut policy) {
                    tracing::error!(error = %e, "Friend could not move");
                    break;
                }
            }
            if friend.outcome().is_some() {
                break;
            }
        }
    });
}

/// Run a snake-and-ladders game until someone reaches the last square
async fn run_snakes(args: &Args, config: &SessionConfig) -> Result<()> {
    let (mut game, mut inbound, tracker) = match args.opponent {
        OpponentKind::Ai => (SnakesCoordinator::vs_ai(rng_for(args.seed, 0)).with_config(config), None, None),
        OpponentKind::Loopback => {
            let game_id = new_game_id();
            let (sender, theirs, inbound, tracker) = connect_friend(config, &EventKind::SNAKES).await?;
            spawn_snakes_friend(game_id.clone(), theirs, config.clone());
            let game = SnakesCoordinator::host(game_id, Box::new(sender), rng_for(args.seed, 0))
                .with_config(config);
            (game, Some(inbound), Some(tracker))
        }
    };

    if let Some(rx) = inbound.as_mut() {
        game.invite("you", "friend")?;
        println!("Waiting for friend to accept the invite ...");
        while !game.handshake().is_accepted() {
            let msg = rx.recv().await.ok_or_else(|| anyhow!("Friend left before accepting"))?;
            game.handle_inbound(msg).context("Invite exchange failed")?;
        }
    }
    game.start("you", "friend")?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    print!("{}", render::render_table(game.game()));
    print!("{}", render::render_snakes(game.game()));

    loop {
        if let Some(winner) = game.winner() {
            println!("Game over: {} wins", winner);
            if args.opponent == OpponentKind::Ai && !args.auto {
                println!("Type 'again' for another round, anything else to leave");
                if next_line(&mut stdin).await?.as_deref() == Some("again") {
                    game.restart()?;
                    print!("{}", render::render_snakes(game.game()));
                    continue;
                }
            }
            break;
        }

        if let Some(landing) = game.play_ai_turn_paced().await? {
            println!(
                "AI rolled {} and moved {} -> {}{}",
                landing.roll,
                landing.from,
                landing.to,
                render::describe_jump(landing.jump)
            );
            print!("{}", render::render_snakes(game.game()));
            continue;
        }

        let local_turn = game.is_local_turn();
        if local_turn {
            if args.auto {
                tokio::time::sleep(Duration::from_millis(config.ai_delay_ms / 4)).await;
            } else {
                println!("Press enter to roll, 'quit' to leave");
            }
        }

        tokio::select! {
            _ = signal::ctrl_c() => {
                println!("\nReceived Ctrl+C, shutting down...");
                break;
            }

            line = next_line(&mut stdin), if local_turn && !args.auto => {
                match line?.as_deref() {
                    None | Some("quit") | Some("q") => break,
                    Some(_) => roll_and_report(&mut game)?,
                }
            }

            _ = std::future::ready(()), if local_turn && args.auto => {
                roll_and_report(&mut game)?;
            }

            msg = next_inbound(&mut inbound) => {
                let Some(msg) = msg else {
                    println!("Friend disconnected");
                    if let Some(tracker) = &tracker {
                        tracker.handle_disconnection();
                    }
                    break;
                };
                match game.handle_inbound(msg) {
                    Ok(0) => {}
                    Ok(_) => print!("{}", render::render_snakes(game.game())),
                    Err(e) => return Err(anyhow!(e).context("Lost sync with friend")),
                }
            }
        }
    }

    Ok(())
}

fn roll_and_report(game: &mut SnakesCoordinator) -> Result<()> {
    let landing = game.roll()?;
    println!(
        "You rolled {} and moved {} -> {}{}",
        landing.roll,
        landing.from,
        landing.to,
        render::describe_jump(landing.jump)
    );
    print!("{}", render::render_snakes(game.game()));
    Ok(())
}

/// Simulated friend for snakes: a guest that rolls whenever it may
fn spawn_snakes_friend(game_id: String, link: LocalLink, config: SessionConfig) {
    tokio::spawn(async move {
        let (sender, mut receiver) = link.into_split();
        let mut friend = SnakesCoordinator::guest(game_id, Box::new(sender)).with_config(&config);

        while let Some(msg) = receiver.recv().await {
            if let Err(e) = friend.handle_inbound(msg) {
                tracing::error!(error = %e, "Friend lost sync");
                break;
            }
            if friend.handshake().pending_invite().is_some() {
                if let Err(e) = friend.accept_invite() {
                    tracing::error!(error = %e, "Friend could not accept the invite");
                    break;
                }
            }
            if friend.is_local_turn() {
                tokio::time::sleep(config.ai_delay()).await;
                if let Err(e) = friend.roll() {
                    tracing::error!(error = %e, "Friend could not roll");
                    break;
                }
            }
            if friend.winner().is_some() {
                break;
            }
        }
    });
}
