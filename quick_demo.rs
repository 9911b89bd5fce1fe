// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quick demo: two capture-greedy AIs play checkers over an in-process link
//! and print the final position.

use anyhow::{bail, Context, Result};
use duelboard_core::CaptureGreedy;
use duelboard_network::{new_game_id, CheckersCoordinator, LinkReceiver, LocalLink};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Turns after which a blocked game is abandoned
const MAX_TURNS: usize = 500;

fn drain(receiver: &mut LinkReceiver, to: &mut CheckersCoordinator) -> Result<usize> {
    let mut applied = 0;
    while let Some(msg) = receiver.try_recv() {
        applied += to.handle_inbound(msg).context("peer message did not apply")?;
    }
    Ok(applied)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let game_id = new_game_id();
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();

    let mut host = CheckersCoordinator::host(game_id.clone(), Box::new(host_tx));
    let mut guest = CheckersCoordinator::guest(game_id, Box::new(guest_tx));
    let mut host_ai = CaptureGreedy::from_entropy();
    let mut guest_ai = CaptureGreedy::from_entropy();

    host.invite("host", "guest")?;
    drain(&mut guest_rx, &mut guest)?;
    guest.accept_invite()?;
    drain(&mut host_rx, &mut host)?;

    host.start("host", "guest")?;
    drain(&mut guest_rx, &mut guest)?;

    for turn in 0..MAX_TURNS {
        if let Some(outcome) = host.outcome() {
            println!("{}", host.board());
            println!("{} wins after {} turns", outcome.winner, turn);
            if guest.outcome() != Some(outcome) {
                bail!("guest disagrees on the result");
            }
            return Ok(());
        }

        if host.is_local_turn() {
            let played = host.play_policy_turn(&mut host_ai)?;
            info!(turn, moves = played.len(), "Host played");
            drain(&mut guest_rx, &mut guest)?;
        } else if guest.is_local_turn() {
            let played = guest.play_policy_turn(&mut guest_ai)?;
            info!(turn, moves = played.len(), "Guest played");
            drain(&mut host_rx, &mut host)?;
        }

        if host.board() != guest.board() {
            bail!("boards diverged at turn {}", turn);
        }
        if host.local_candidates().is_empty() && guest.local_candidates().is_empty() {
            break;
        }
    }

    println!("{}", host.board());
    println!("No result: the side to move is blocked or the turn limit was reached");
    Ok(())
}
