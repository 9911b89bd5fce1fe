// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests over boards reached by random self-play

use duelboard_core::{board::Board, CaptureGreedy, Move, MovePolicy, Rules, Side};
use proptest::prelude::*;

/// Play up to `plies` turns with capture chains, collecting every position seen
fn playout(seed: u64, plies: usize) -> Vec<(Board, Side)> {
    let mut policy = CaptureGreedy::seeded(seed);
    let mut board = Board::new();
    let mut side = Side::Player;
    let mut seen = vec![(board, side)];

    for _ in 0..plies {
        if board.is_terminal().is_some() {
            break;
        }
        let Some(mut mv) = policy.choose_move(&board, side) else {
            break;
        };
        loop {
            board = board.apply_move(&mv).expect("policy moves are applicable");
            seen.push((board, side));
            if !mv.is_capture() {
                break;
            }
            let follow_up: Vec<Move> = Rules::new(&board)
                .legal_moves(side, mv.to)
                .into_iter()
                .filter(Move::is_capture)
                .collect();
            match policy.select(&follow_up) {
                Some(next) => mv = next,
                None => break,
            }
        }
        side = side.opposite();
    }
    seen
}

proptest! {
    #[test]
    fn legal_moves_stay_on_empty_squares(seed in any::<u64>(), plies in 1..120usize) {
        for (board, _) in playout(seed, plies) {
            for side in [Side::Player, Side::Opponent] {
                for mv in Rules::new(&board).all_legal_moves(side) {
                    prop_assert!(mv.to.is_valid());
                    prop_assert!(mv.to.is_dark());
                    prop_assert!(board.get(mv.to).is_empty());
                    prop_assert_eq!(board.get(mv.from).side(), Some(side));
                }
            }
        }
    }

    #[test]
    fn pieces_only_on_dark_squares(seed in any::<u64>(), plies in 1..120usize) {
        for (board, _) in playout(seed, plies) {
            prop_assert!(board.count_pieces(Side::Player) <= 12);
            prop_assert!(board.count_pieces(Side::Opponent) <= 12);
            let text = board.to_string();
            prop_assert_eq!(text.parse::<Board>().unwrap(), board);
        }
    }

    #[test]
    fn mandatory_capture_per_piece(seed in any::<u64>(), plies in 1..120usize) {
        for (board, side) in playout(seed, plies) {
            let rules = Rules::new(&board);
            for at in board.pieces(side) {
                let moves = rules.legal_moves(side, at);
                let captures = moves.iter().filter(|m| m.is_capture()).count();
                prop_assert!(captures == 0 || captures == moves.len());
            }
        }
    }
}
