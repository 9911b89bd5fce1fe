// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duelboard Core - Game Rules and Board Logic
//!
//! This crate provides the core game functionality including:
//! - Checkers board representation and move application
//! - Move generation with per-piece mandatory captures and capture chains
//! - A capture-greedy AI opponent
//! - Snake-and-ladders jump tables, dice and movement

#![deny(unsafe_code)]
#![deny(clippy::all)]

pub mod board;
pub mod engine;
pub mod rules;
pub mod snakes;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width and height of the checkers grid
pub const BOARD_SIZE: u8 = 8;

/// One of the two sides of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The local player; advances toward row 0 and moves first
    Player,
    /// The AI or remote opponent; advances toward row 7
    Opponent,
}

impl Side {
    /// Returns the other side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }

    /// Row delta of a forward step for this side
    pub fn forward(&self) -> i8 {
        match self {
            Side::Player => -1,
            Side::Opponent => 1,
        }
    }

    /// Slot for per-side arrays
    pub fn index(&self) -> usize {
        match self {
            Side::Player => 0,
            Side::Opponent => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Player => write!(f, "player"),
            Side::Opponent => write!(f, "opponent"),
        }
    }
}

/// Content of a single board cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Player,
    Opponent,
}

impl Cell {
    /// The cell holding a piece of `side`
    pub fn piece(side: Side) -> Self {
        match side {
            Side::Player => Cell::Player,
            Side::Opponent => Cell::Opponent,
        }
    }

    /// Owner of the piece in this cell, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::Player => Some(Side::Player),
            Cell::Opponent => Some(Side::Opponent),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// Board coordinate; row 0 is the opponent's back row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    /// Create a new coordinate
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Check that the coordinate lies on the 8x8 grid
    pub fn is_valid(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    /// Dark squares are the only ones pieces may occupy
    pub fn is_dark(&self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Shift by a signed delta, `None` when the result leaves the grid
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Coord> {
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if (0..BOARD_SIZE as i8).contains(&row) && (0..BOARD_SIZE as i8).contains(&col) {
            Some(Coord::new(row as u8, col as u8))
        } else {
            None
        }
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// A candidate transition for one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
    /// Cell of the jumped opposing piece, set for captures only
    pub captured: Option<Coord>,
}

impl Move {
    /// A plain diagonal advance
    pub fn step(from: Coord, to: Coord) -> Self {
        Self { from, to, captured: None }
    }

    /// A jump over `captured` into `to`
    pub fn jump(from: Coord, captured: Coord, to: Coord) -> Self {
        Self {
            from,
            to,
            captured: Some(captured),
        }
    }

    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.captured {
            Some(c) => write!(f, "{} x{} -> {}", self.from, c, self.to),
            None => write!(f, "{} -> {}", self.from, self.to),
        }
    }
}

/// Terminal result of a game; draws are not modeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub winner: Side,
}

/// A snake or ladder taken after landing on a square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Jump {
    Snake { from: u8, to: u8 },
    Ladder { from: u8, to: u8 },
}

impl Jump {
    /// Square the token ends on
    pub fn destination(&self) -> u8 {
        match self {
            Jump::Snake { to, .. } | Jump::Ladder { to, .. } => *to,
        }
    }
}

/// Game events emitted during play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A checkers move was applied
    MoveMade {
        /// The move that was made
        mv: Move,
        /// The side that made the move
        by: Side,
    },
    /// A piece was removed by a jump
    PieceCaptured {
        /// Where the captured piece stood
        at: Coord,
        /// The side that lost the piece
        owner: Side,
    },
    /// Control passed to the other side
    TurnPassed {
        /// The side now acting
        to: Side,
    },
    /// A die was rolled in snake-and-ladders
    DiceRolled {
        /// The side that rolled
        side: Side,
        /// Face value in 1..=6
        value: u8,
    },
    /// A snake-and-ladders token moved
    PositionChanged {
        /// The side that moved
        side: Side,
        /// Square before the roll
        from: u8,
        /// Square after the roll and any jump
        to: u8,
        /// Snake or ladder taken, if any
        jump: Option<Jump>,
    },
    /// The game has ended
    GameEnded {
        /// The winning side
        winner: Side,
    },
}

/// Errors that can occur during game play
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The coordinate is outside the board or not a dark square
    #[error("Invalid coordinate {0}")]
    InvalidCoordinate(Coord),

    /// There is no piece to move
    #[error("No piece at origin {0}")]
    EmptyOrigin(Coord),

    /// The destination already holds a piece
    #[error("Destination {0} already occupied")]
    OccupiedDestination(Coord),

    /// The jumped cell does not hold an opposing piece
    #[error("No opposing piece to capture at {0}")]
    InvalidCapture(Coord),

    /// The acting side does not own the piece or does not have the turn
    #[error("It is not {0}'s move")]
    WrongSide(Side),

    /// A snake or ladder table violates its invariants
    #[error("Invalid snake/ladder table: {0}")]
    InvalidTable(String),

    /// A textual board could not be parsed
    #[error("Invalid board layout: {0}")]
    InvalidLayout(String),

    /// Other game rules violation
    #[error("Invalid move: {0}")]
    InvalidMove(String),
}

pub use board::Board;
pub use engine::{CaptureGreedy, MovePolicy};
pub use rules::{has_further_capture, legal_moves, Rules};
pub use snakes::{advance, roll_dice, JumpTable, Landing, SnakesGame};
