// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property test for message reordering
//! Tests that shuffled and duplicated deliveries leave both peers on the same board

use duelboard_core::CaptureGreedy;
use duelboard_network::{CheckersCoordinator, MemoryOutbox, SequenceTracker, SyncMessage};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Upper bound on turns before a blocked game is abandoned
const MAX_TURNS: usize = 400;

// Deliver a batch twice over, in random order
fn deliver(batch: Vec<SyncMessage>, to: &mut CheckersCoordinator, rng: &mut StdRng) {
    let mut frames: Vec<SyncMessage> = batch.into_iter().flat_map(|m| [m.clone(), m]).collect();
    frames.shuffle(rng);
    for frame in frames {
        to.handle_inbound(frame).expect("sequenced delivery never desyncs");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_replicas_converge(seed in any::<u64>()) {
        let host_out = MemoryOutbox::new();
        let guest_out = MemoryOutbox::new();
        let mut host = CheckersCoordinator::host("prop".into(), Box::new(host_out.clone()));
        let mut guest = CheckersCoordinator::guest("prop".into(), Box::new(guest_out.clone()));
        let mut host_ai = CaptureGreedy::seeded(seed);
        let mut guest_ai = CaptureGreedy::seeded(seed.wrapping_add(1));
        let mut net = StdRng::seed_from_u64(seed);

        host.invite("alice", "bob").unwrap();
        deliver(host_out.take(), &mut guest, &mut net);
        guest.accept_invite().unwrap();
        deliver(guest_out.take(), &mut host, &mut net);
        prop_assert!(host.is_local_turn());

        host.start("alice", "bob").unwrap();
        for _ in 0..MAX_TURNS {
            if host.outcome().is_some() && guest.outcome().is_some() {
                break;
            }
            if host.is_local_turn() {
                host.play_policy_turn(&mut host_ai).unwrap();
            }
            deliver(host_out.take(), &mut guest, &mut net);
            if guest.is_local_turn() {
                guest.play_policy_turn(&mut guest_ai).unwrap();
            }
            deliver(guest_out.take(), &mut host, &mut net);
        }

        prop_assert_eq!(host.board(), guest.board());
        prop_assert_eq!(host.outcome(), guest.outcome());
        prop_assert_eq!(host.to_move(), guest.to_move());
    }

    #[test]
    fn test_tracker_releases_in_order(order in Just((0..64u64).collect::<Vec<_>>()).prop_shuffle()) {
        let mut tracker = SequenceTracker::new();
        let mut released = Vec::new();
        for seq in order {
            released.extend(tracker.accept(seq, seq).unwrap());
            // A second copy never releases anything
            prop_assert!(tracker.accept(seq, seq).unwrap().is_empty());
        }
        prop_assert_eq!(released, (0..64u64).collect::<Vec<_>>());
    }
}
