// SPDX-License-Identifier: MIT OR Apache-2.0

//! Move generation and legality
//!
//! Pieces are uniform (no kings) and only ever move diagonally forward for
//! their side. Captures are mandatory per piece: if the selected piece can
//! jump, its plain advances are not offered.

use crate::{board::Board, Coord, GameError, Move, Side};

/// Column deltas of the two forward diagonals
const DIAGONALS: [i8; 2] = [-1, 1];

/// Move generator and validator over a borrowed board
pub struct Rules<'a> {
    /// The board being checked
    board: &'a Board,
}

impl<'a> Rules<'a> {
    /// Create a new rules view of `board`
    pub fn new(board: &'a Board) -> Self {
        Self { board }
    }

    /// Legal moves for the piece of `side` at `at`.
    ///
    /// Returns only captures when at least one capture exists for this piece,
    /// otherwise the single-step advances. Empty when `at` does not hold a
    /// piece of `side`.
    pub fn legal_moves(&self, side: Side, at: Coord) -> Vec<Move> {
        if self.board.get(at).side() != Some(side) {
            return Vec::new();
        }

        let dr = side.forward();
        let mut steps = Vec::with_capacity(2);
        let mut jumps = Vec::new();

        for dc in DIAGONALS {
            if let Some(to) = at.offset(dr, dc) {
                if self.board.get(to).is_empty() {
                    steps.push(Move::step(at, to));
                }
            }

            if let (Some(over), Some(to)) = (at.offset(dr, dc), at.offset(2 * dr, 2 * dc)) {
                if self.board.get(over).side() == Some(side.opposite())
                    && self.board.get(to).is_empty()
                {
                    jumps.push(Move::jump(at, over, to));
                }
            }
        }

        if jumps.is_empty() {
            steps
        } else {
            jumps
        }
    }

    /// Whether the piece now standing at `at` can capture again
    pub fn has_further_capture(&self, side: Side, at: Coord) -> bool {
        self.legal_moves(side, at).iter().any(Move::is_capture)
    }

    /// Every piece's legal moves concatenated, in board order
    pub fn all_legal_moves(&self, side: Side) -> Vec<Move> {
        self.board
            .pieces(side)
            .flat_map(|at| self.legal_moves(side, at))
            .collect()
    }

    /// Check that `mv` is one of the moves `side` may make from `mv.from`
    pub fn check_move(&self, side: Side, mv: &Move) -> Result<(), GameError> {
        if !mv.from.is_valid() {
            return Err(GameError::InvalidCoordinate(mv.from));
        }

        match self.board.get(mv.from).side() {
            None => return Err(GameError::EmptyOrigin(mv.from)),
            Some(owner) if owner != side => return Err(GameError::WrongSide(side)),
            Some(_) => {}
        }

        if self.legal_moves(side, mv.from).contains(mv) {
            Ok(())
        } else {
            tracing::debug!(%mv, %side, "Rejected move outside the legal set");
            Err(GameError::InvalidMove(format!("{} is not legal for {}", mv, side)))
        }
    }
}

/// Shorthand for [`Rules::legal_moves`]
pub fn legal_moves(board: &Board, side: Side, at: Coord) -> Vec<Move> {
    Rules::new(board).legal_moves(side, at)
}

/// Shorthand for [`Rules::has_further_capture`]
pub fn has_further_capture(board: &Board, side: Side, at: Coord) -> bool {
    Rules::new(board).has_further_capture(side, at)
}
