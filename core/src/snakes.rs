// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snake-and-ladders rules
//!
//! Squares are numbered 1..=100 and both tokens start off the board at 0.
//! A roll moves the token forward, clamped to the last square, after which at
//! most one snake or ladder is taken.

use crate::{GameError, Jump, Side};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last square; reaching it wins
pub const BOARD_END: u8 = 100;
/// Faces on the die
pub const DICE_FACES: u8 = 6;
/// Snakes generated per game
pub const SNAKE_COUNT: usize = 10;
/// Ladders generated per game
pub const LADDER_COUNT: usize = 9;

/// Give up after this many collided layouts; practically unreachable
const MAX_GENERATION_ATTEMPTS: usize = 1000;

/// Snake heads and ladder feet for one game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawJumpTable")]
pub struct JumpTable {
    /// Head square to tail square, always downward
    snakes: BTreeMap<u8, u8>,
    /// Foot square to top square, always upward
    ladders: BTreeMap<u8, u8>,
}

/// Unchecked serde form; deserializing goes through [`JumpTable::new`]
#[derive(Deserialize)]
struct RawJumpTable {
    snakes: BTreeMap<u8, u8>,
    ladders: BTreeMap<u8, u8>,
}

impl TryFrom<RawJumpTable> for JumpTable {
    type Error = GameError;

    fn try_from(raw: RawJumpTable) -> Result<Self, Self::Error> {
        JumpTable::new(raw.snakes, raw.ladders)
    }
}

impl JumpTable {
    /// Build a table, checking direction, range and that no square is both
    /// a snake head and a ladder foot
    pub fn new(snakes: BTreeMap<u8, u8>, ladders: BTreeMap<u8, u8>) -> Result<Self, GameError> {
        for (&head, &tail) in &snakes {
            if !(1..=BOARD_END).contains(&tail) || head > BOARD_END || tail >= head {
                return Err(GameError::InvalidTable(format!(
                    "snake {} -> {} must go down within the board",
                    head, tail
                )));
            }
        }
        for (&foot, &top) in &ladders {
            if foot == 0 || top > BOARD_END || top <= foot {
                return Err(GameError::InvalidTable(format!(
                    "ladder {} -> {} must go up within the board",
                    foot, top
                )));
            }
        }
        if let Some(square) = snakes.keys().find(|k| ladders.contains_key(*k)) {
            return Err(GameError::InvalidTable(format!(
                "square {} is both a snake head and a ladder foot",
                square
            )));
        }
        Ok(Self { snakes, ladders })
    }

    /// A table with no snakes or ladders
    pub fn empty() -> Self {
        Self::default()
    }

    /// Random layout of ten snakes and nine ladders.
    ///
    /// A layout in which some square is both a snake head and a ladder foot
    /// is thrown away and drawn again from scratch.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let snakes = draw_entries(&mut *rng, SNAKE_COUNT, |rng| {
                let head = rng.gen_range(2..BOARD_END);
                (head, rng.gen_range(1..head))
            });
            let ladders = draw_entries(&mut *rng, LADDER_COUNT, |rng| {
                let foot = rng.gen_range(1..BOARD_END - 1);
                (foot, rng.gen_range(foot + 1..=BOARD_END))
            });

            match Self::new(snakes, ladders) {
                Ok(table) => {
                    tracing::debug!(attempt, "Generated snake/ladder table");
                    return table;
                }
                Err(e) => tracing::trace!(attempt, error = %e, "Regenerating snake/ladder table"),
            }
        }

        tracing::warn!("Could not generate a disjoint table, playing without snakes or ladders");
        Self::empty()
    }

    /// The snake or ladder starting on `square`, if any
    pub fn jump_at(&self, square: u8) -> Option<Jump> {
        if let Some(&to) = self.snakes.get(&square) {
            Some(Jump::Snake { from: square, to })
        } else {
            self.ladders
                .get(&square)
                .map(|&to| Jump::Ladder { from: square, to })
        }
    }

    pub fn snakes(&self) -> &BTreeMap<u8, u8> {
        &self.snakes
    }

    pub fn ladders(&self) -> &BTreeMap<u8, u8> {
        &self.ladders
    }
}

/// Draw `count` entries with distinct keys
fn draw_entries<R, F>(rng: &mut R, count: usize, mut draw: F) -> BTreeMap<u8, u8>
where
    R: Rng + ?Sized,
    F: FnMut(&mut R) -> (u8, u8),
{
    let mut entries = BTreeMap::new();
    while entries.len() < count {
        let (from, to) = draw(&mut *rng);
        entries.entry(from).or_insert(to);
    }
    entries
}

/// Roll one die
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(1..=DICE_FACES)
}

/// Square reached from `position` after rolling `roll`
pub fn advance(position: u8, roll: u8, table: &JumpTable) -> u8 {
    land(position, roll, table).0
}

fn land(position: u8, roll: u8, table: &JumpTable) -> (u8, Option<Jump>) {
    let landed = position.saturating_add(roll).min(BOARD_END);
    match table.jump_at(landed) {
        Some(jump) => (jump.destination(), Some(jump)),
        None => (landed, None),
    }
}

/// Result of applying one roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landing {
    pub side: Side,
    pub roll: u8,
    pub from: u8,
    pub to: u8,
    pub jump: Option<Jump>,
    /// Whether this roll reached the last square
    pub finished: bool,
}

/// State of one snake-and-ladders game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnakesGame {
    table: JumpTable,
    positions: [u8; 2],
    to_move: Side,
    winner: Option<Side>,
}

impl SnakesGame {
    /// A new game; the player rolls first
    pub fn new(table: JumpTable) -> Self {
        Self {
            table,
            positions: [0, 0],
            to_move: Side::Player,
            winner: None,
        }
    }

    pub fn table(&self) -> &JumpTable {
        &self.table
    }

    pub fn position(&self, side: Side) -> u8 {
        self.positions[side.index()]
    }

    pub fn to_move(&self) -> Side {
        self.to_move
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    /// Put both tokens back on the start square, keeping the table
    pub fn restart(&mut self) {
        self.positions = [0, 0];
        self.to_move = Side::Player;
        self.winner = None;
    }

    /// Apply a roll made by `side`, passing the turn unless the game ends
    pub fn apply_roll(&mut self, side: Side, roll: u8) -> Result<Landing, GameError> {
        self.ensure_turn(side)?;
        if !(1..=DICE_FACES).contains(&roll) {
            return Err(GameError::InvalidMove(format!("die cannot show {}", roll)));
        }

        let from = self.position(side);
        let (to, jump) = land(from, roll, &self.table);
        Ok(self.commit(side, roll, from, to, jump))
    }

    /// Move `side` straight to `position`, as reported by a trusted peer
    pub fn set_position(&mut self, side: Side, roll: u8, position: u8) -> Result<Landing, GameError> {
        self.ensure_turn(side)?;
        if !(1..=DICE_FACES).contains(&roll) || position > BOARD_END {
            return Err(GameError::InvalidMove(format!(
                "roll {} to square {} is out of range",
                roll, position
            )));
        }

        let from = self.position(side);
        let jump = self
            .table
            .jump_at(from.saturating_add(roll).min(BOARD_END))
            .filter(|j| j.destination() == position);
        Ok(self.commit(side, roll, from, position, jump))
    }

    fn ensure_turn(&self, side: Side) -> Result<(), GameError> {
        if self.winner.is_some() {
            return Err(GameError::InvalidMove("game is already over".to_string()));
        }
        if side != self.to_move {
            return Err(GameError::WrongSide(side));
        }
        Ok(())
    }

    fn commit(&mut self, side: Side, roll: u8, from: u8, to: u8, jump: Option<Jump>) -> Landing {
        self.positions[side.index()] = to;
        let finished = to == BOARD_END;
        if finished {
            self.winner = Some(side);
        } else {
            self.to_move = side.opposite();
        }
        Landing {
            side,
            roll,
            from,
            to,
            jump,
            finished,
        }
    }
}
