// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration test for move deduplication
//! Tests that moves are applied once when the link delivers them several times

use anyhow::Result;
use duelboard_core::{Coord, Move, Side};
use duelboard_network::messages::CheckersMove;
use duelboard_network::{CheckersCoordinator, LocalLink, Messenger, SyncError, SyncMessage};

/// Host and guest that already went through the invite exchange
fn connected_pair() -> (CheckersCoordinator, CheckersCoordinator, LocalLink, LocalLink) {
    let (mut alice_link, mut bob_link) = LocalLink::pair();
    let mut alice = CheckersCoordinator::host("dup-game".into(), Box::new(alice_link.sender.clone()));
    let mut bob = CheckersCoordinator::guest("dup-game".into(), Box::new(bob_link.sender.clone()));

    alice.invite("alice", "bob").expect("invite sent");
    let invite = bob_link.receiver.try_recv().expect("invite frame");
    bob.handle_inbound(invite).expect("invite applies");
    bob.accept_invite().expect("invite accepted");
    let reply = alice_link.receiver.try_recv().expect("acceptance frame");
    alice.handle_inbound(reply).expect("acceptance applies");
    (alice, bob, alice_link, bob_link)
}

#[tokio::test]
async fn test_move_deduplication() -> Result<()> {
    let (mut alice, mut bob, alice_link, mut bob_link) = connected_pair();
    alice.start("alice", "bob")?;
    alice.play_local_move(Move::step(Coord::new(5, 2), Coord::new(4, 3)))?;

    let start = bob_link.receiver.recv().await.expect("game start");
    let mv = bob_link.receiver.recv().await.expect("first move");
    assert_eq!(start.sequence(), 1);
    assert_eq!(bob.handle_inbound(start)?, 1);
    assert_eq!(bob.peer_id(), Some("alice"));
    assert_eq!(bob.handle_inbound(mv.clone())?, 1);
    let after_first = *bob.board();

    // Replay the same frame through the link several times
    for _ in 0..5 {
        alice_link.sender.send(mv.clone())?;
    }
    for _ in 0..5 {
        let dup = bob_link.receiver.recv().await.expect("duplicate");
        assert_eq!(bob.handle_inbound(dup)?, 0);
    }

    assert_eq!(bob.board(), &after_first);
    assert_eq!(bob.board(), alice.board());
    assert_eq!(bob.to_move(), Side::Opponent);
    Ok(())
}

#[tokio::test]
async fn test_late_message_waits_for_gap() -> Result<()> {
    let (mut alice, mut bob, _alice_link, mut bob_link) = connected_pair();
    alice.start("alice", "bob")?;
    alice.play_local_move(Move::step(Coord::new(5, 2), Coord::new(4, 3)))?;

    let start = bob_link.receiver.recv().await.expect("game start");
    let mv = bob_link.receiver.recv().await.expect("first move");

    // Move arrives before the game start
    assert_eq!(bob.handle_inbound(mv)?, 0);
    assert_eq!(bob.to_move(), Side::Player);
    assert_eq!(bob.handle_inbound(start)?, 2);
    assert_eq!(bob.board(), alice.board());
    assert!(bob.is_local_turn());
    Ok(())
}

#[test]
fn test_far_future_message_exceeds_window() {
    let (_alice, mut bob, _a, _b) = connected_pair();
    let mv = Move::step(Coord::new(5, 2), Coord::new(4, 3));
    let msg = SyncMessage::CheckersMove(CheckersMove::new("dup-game".into(), 100_000, Side::Player, &mv, false));

    assert!(matches!(bob.handle_inbound(msg), Err(SyncError::Sequence(_))));
}
