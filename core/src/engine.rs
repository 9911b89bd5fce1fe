// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move policies for automated players

use crate::{board::Board, rules::Rules, Move, Side};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Chooses one move out of a candidate list
pub trait MovePolicy: Send {
    /// Pick one of `candidates`, `None` only when the list is empty
    fn select(&mut self, candidates: &[Move]) -> Option<Move>;

    /// Enumerate every legal move of `side` across the whole board and pick one
    fn choose_move(&mut self, board: &Board, side: Side) -> Option<Move> {
        let candidates = Rules::new(board).all_legal_moves(side);
        tracing::trace!(%side, candidates = candidates.len(), "Choosing move");
        self.select(&candidates)
    }
}

/// One-ply heuristic: any capture beats any step, ties broken at random.
///
/// No lookahead is performed.
pub struct CaptureGreedy<R = StdRng> {
    rng: R,
}

impl CaptureGreedy<StdRng> {
    /// Policy seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic policy for reproducible games
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> CaptureGreedy<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> MovePolicy for CaptureGreedy<R> {
    fn select(&mut self, candidates: &[Move]) -> Option<Move> {
        let captures: Vec<&Move> = candidates.iter().filter(|m| m.is_capture()).collect();
        if !captures.is_empty() {
            return captures.choose(&mut self.rng).map(|m| **m);
        }
        candidates.choose(&mut self.rng).copied()
    }
}
