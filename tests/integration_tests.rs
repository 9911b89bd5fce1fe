// SPDX-License-Identifier: MIT OR Apache-2.0

// Integration tests for duelboard
// Run with: cargo test --test integration_tests

use duelboard_core::{board::Board, CaptureGreedy, Coord, GameEvent, JumpTable, Move, Side};
use duelboard_network::messages::{BoardLayout, GameStart};
use duelboard_network::{
    CheckersCoordinator, EventKind, LinkReceiver, LocalLink, MessageRouter, Messenger,
    SnakesCoordinator, SyncError, SyncMessage,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn drain_checkers(receiver: &mut LinkReceiver, to: &mut CheckersCoordinator) -> usize {
    let mut applied = 0;
    while let Some(msg) = receiver.try_recv() {
        applied += to.handle_inbound(msg).expect("peer message applies");
    }
    applied
}

fn drain_snakes(receiver: &mut LinkReceiver, to: &mut SnakesCoordinator) -> usize {
    let mut applied = 0;
    while let Some(msg) = receiver.try_recv() {
        applied += to.handle_inbound(msg).expect("peer message applies");
    }
    applied
}

/// Host invites, guest accepts; afterwards the host may move
fn accept_checkers(
    host: &mut CheckersCoordinator,
    host_rx: &mut LinkReceiver,
    guest: &mut CheckersCoordinator,
    guest_rx: &mut LinkReceiver,
) {
    host.invite("alice", "bob").unwrap();
    assert!(!host.is_local_turn());
    assert_eq!(drain_checkers(guest_rx, guest), 1);
    guest.accept_invite().unwrap();
    assert_eq!(drain_checkers(host_rx, host), 1);
}

fn accept_snakes(
    host: &mut SnakesCoordinator,
    host_rx: &mut LinkReceiver,
    guest: &mut SnakesCoordinator,
    guest_rx: &mut LinkReceiver,
) {
    host.invite("alice", "bob").unwrap();
    assert_eq!(drain_snakes(guest_rx, guest), 1);
    guest.accept_invite().unwrap();
    assert_eq!(drain_snakes(host_rx, host), 1);
}

#[tokio::test]
async fn test_two_player_chain_capture_flow() {
    // Opponent at (1,2) can take (2,3) and then (4,5) once the host has moved
    let position: Board = "
        .o......
        ..o.....
        ...p....
        ........
        .....p..
        ........
        .p......
        ........"
        .parse()
        .unwrap();

    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();
    let mut host = CheckersCoordinator::host("chain".into(), Box::new(host_tx))
        .with_position(position, Side::Player);
    let mut guest = CheckersCoordinator::guest("chain".into(), Box::new(guest_tx))
        .with_position(position, Side::Player);
    let mut host_events = host.subscribe();

    accept_checkers(&mut host, &mut host_rx, &mut guest, &mut guest_rx);
    host.start("alice", "bob").unwrap();
    assert!(!host.play_local_move(Move::step(Coord::new(6, 1), Coord::new(5, 0))).unwrap());
    assert_eq!(drain_checkers(&mut guest_rx, &mut guest), 2);
    assert!(guest.is_local_turn());

    let first = Move::jump(Coord::new(1, 2), Coord::new(2, 3), Coord::new(3, 4));
    assert!(guest.play_local_move(first).unwrap());
    // The chained piece keeps the turn; no other piece may move
    assert!(guest.is_local_turn());
    assert!(guest.local_candidates().iter().all(|m| m.from == Coord::new(3, 4)));

    let second = Move::jump(Coord::new(3, 4), Coord::new(4, 5), Coord::new(5, 6));
    assert!(!guest.play_local_move(second).unwrap());
    assert_eq!(drain_checkers(&mut host_rx, &mut host), 2);

    assert_eq!(host.board(), guest.board());
    assert_eq!(host.board().count_pieces(Side::Player), 1);
    assert!(host.is_local_turn());

    let mut captured = Vec::new();
    while let Ok(event) = host_events.try_recv() {
        if let GameEvent::PieceCaptured { at, owner } = event {
            assert_eq!(owner, Side::Player);
            captured.push(at);
        }
    }
    assert_eq!(captured, vec![Coord::new(2, 3), Coord::new(4, 5)]);
}

#[tokio::test]
async fn test_ai_players_finish_in_sync() {
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();
    let mut host = CheckersCoordinator::host("ai-vs-ai".into(), Box::new(host_tx));
    let mut guest = CheckersCoordinator::guest("ai-vs-ai".into(), Box::new(guest_tx));
    let mut host_ai = CaptureGreedy::seeded(11);
    let mut guest_ai = CaptureGreedy::seeded(12);

    accept_checkers(&mut host, &mut host_rx, &mut guest, &mut guest_rx);
    host.start("alice", "bob").unwrap();
    drain_checkers(&mut guest_rx, &mut guest);

    for _ in 0..500 {
        let blocked = host.local_candidates().is_empty() && guest.local_candidates().is_empty();
        if host.outcome().is_some() || blocked {
            break;
        }
        if host.is_local_turn() {
            host.play_policy_turn(&mut host_ai).unwrap();
            drain_checkers(&mut guest_rx, &mut guest);
        } else {
            guest.play_policy_turn(&mut guest_ai).unwrap();
            drain_checkers(&mut host_rx, &mut host);
        }
        assert_eq!(host.board(), guest.board());
        assert_eq!(host.to_move(), guest.to_move());
    }

    assert_eq!(host.outcome(), guest.outcome());
}

#[tokio::test]
async fn test_desync_surfaces_to_application() {
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();
    let mut host = CheckersCoordinator::host("desync".into(), Box::new(host_tx.clone()));
    let mut guest = CheckersCoordinator::guest("desync".into(), Box::new(guest_tx));

    accept_checkers(&mut host, &mut host_rx, &mut guest, &mut guest_rx);
    host.start("alice", "bob").unwrap();
    drain_checkers(&mut guest_rx, &mut guest);

    // A forged move onto an occupied square
    let forged = Move::step(Coord::new(6, 1), Coord::new(5, 2));
    let msg = SyncMessage::CheckersMove(duelboard_network::messages::CheckersMove::new(
        "desync".into(),
        2,
        Side::Player,
        &forged,
        false,
    ));
    host_tx.send(msg).unwrap();

    let before = *guest.board();
    let frame = guest_rx.recv().await.unwrap();
    assert!(matches!(guest.handle_inbound(frame), Err(SyncError::Desync(_))));
    assert_eq!(guest.board(), &before);
    assert_eq!(guest.to_move(), Side::Player);

    // The game stays halted even for an honest follow-up
    host.play_local_move(Move::step(Coord::new(5, 2), Coord::new(4, 3))).unwrap();
    let honest = guest_rx.recv().await.unwrap();
    assert!(matches!(guest.handle_inbound(honest), Err(SyncError::Halted)));
    assert_eq!(guest.board(), &before);
}

#[tokio::test]
async fn test_closed_link_leaves_host_unchanged() {
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();
    let mut host = CheckersCoordinator::host("closed".into(), Box::new(host_tx));
    let mut guest = CheckersCoordinator::guest("closed".into(), Box::new(guest_tx));

    accept_checkers(&mut host, &mut host_rx, &mut guest, &mut guest_rx);
    host.start("alice", "bob").unwrap();
    drain_checkers(&mut guest_rx, &mut guest);
    drop(guest_rx);

    let err = host
        .play_local_move(Move::step(Coord::new(5, 2), Coord::new(4, 3)))
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(host.board(), &Board::new());
    assert!(host.is_local_turn());
    assert_eq!(host.board(), guest.board());
}

#[tokio::test]
async fn test_snakes_host_and_guest_agree() {
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, mut host_rx) = host_link.into_split();
    let (guest_tx, mut guest_rx) = guest_link.into_split();
    let mut host = SnakesCoordinator::host("snakes".into(), Box::new(host_tx), StdRng::seed_from_u64(5));
    let mut guest = SnakesCoordinator::guest("snakes".into(), Box::new(guest_tx));

    accept_snakes(&mut host, &mut host_rx, &mut guest, &mut guest_rx);
    host.start("alice", "bob").unwrap();
    assert_eq!(drain_snakes(&mut guest_rx, &mut guest), 1);
    assert!(guest.is_started());
    assert_eq!(guest.game().table(), host.game().table());

    for _ in 0..5000 {
        if host.winner().is_some() {
            break;
        }
        if host.is_local_turn() {
            host.roll().unwrap();
            drain_snakes(&mut guest_rx, &mut guest);
        } else {
            guest.roll().unwrap();
            drain_snakes(&mut host_rx, &mut host);
        }
        for side in [Side::Player, Side::Opponent] {
            assert_eq!(host.game().position(side), guest.game().position(side));
        }
    }

    assert!(host.winner().is_some());
    assert_eq!(host.winner(), guest.winner());
}

#[tokio::test]
async fn test_router_splits_games_on_one_link() {
    let (host_link, guest_link) = LocalLink::pair();
    let (host_tx, _host_rx) = host_link.into_split();
    let (_guest_tx, mut guest_rx) = guest_link.into_split();

    let mut router = MessageRouter::new();
    let mut checkers_rx = router.subscribe_many(&EventKind::CHECKERS);
    let mut snakes_rx = router.subscribe_many(&EventKind::SNAKES);
    let (done_tx, mut done_rx) = mpsc::channel::<usize>(1);
    let pump = tokio::spawn(async move {
        let mut routed = 0;
        while let Some(msg) = guest_rx.recv().await {
            routed += router.dispatch(msg);
        }
        let _ = done_tx.send(routed).await;
    });

    let start = |game_id: &str, layout| GameStart {
        game_id: game_id.to_string(),
        seq: 1,
        sender_id: "alice".into(),
        receiver_id: "bob".into(),
        layout,
    };
    host_tx.send(SyncMessage::CheckersGameStart(start("c", None))).unwrap();
    let table = BoardLayout::from(&JumpTable::empty());
    host_tx.send(SyncMessage::SnakesGameStart(start("s", Some(table)))).unwrap();
    drop(host_tx);

    let wait = Duration::from_secs(1);
    let first = timeout(wait, checkers_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.kind(), EventKind::CheckersGameStart);
    let second = timeout(wait, snakes_rx.recv()).await.unwrap().unwrap();
    assert_eq!(second.kind(), EventKind::SnakesGameStart);

    assert_eq!(timeout(wait, done_rx.recv()).await.unwrap(), Some(2));
    pump.await.unwrap();
}
