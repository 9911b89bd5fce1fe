// SPDX-License-Identifier: MIT OR Apache-2.0

//! Board representation and move application
//!
//! A [`Board`] is a plain `Copy` value. Applying a move never mutates the
//! receiver; it hands back the successor position, so the only way to
//! change what a game sees is to replace its board wholesale.

use crate::{Cell, Coord, GameError, Move, Outcome, Side, BOARD_SIZE};
use std::fmt;
use std::str::FromStr;

const N: usize = BOARD_SIZE as usize;

/// Rows at the top of the board holding opponent pieces at setup
const OPPONENT_HOME_ROWS: std::ops::Range<u8> = 0..3;
/// Rows at the bottom of the board holding player pieces at setup
const PLAYER_HOME_ROWS: std::ops::Range<u8> = 5..8;

/// An 8x8 checkers grid
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [[Cell; N]; N],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard starting position: twelve pieces per side on the dark squares
    pub fn new() -> Self {
        let mut cells = [[Cell::Empty; N]; N];
        for coord in Self::dark_squares() {
            if OPPONENT_HOME_ROWS.contains(&coord.row) {
                cells[coord.row as usize][coord.col as usize] = Cell::Opponent;
            } else if PLAYER_HOME_ROWS.contains(&coord.row) {
                cells[coord.row as usize][coord.col as usize] = Cell::Player;
            }
        }
        Self { cells }
    }

    /// A board with no pieces at all
    pub fn empty() -> Self {
        Self {
            cells: [[Cell::Empty; N]; N],
        }
    }

    /// All 32 playable squares in row-major order
    pub fn dark_squares() -> impl Iterator<Item = Coord> {
        (0..BOARD_SIZE)
            .flat_map(|row| (0..BOARD_SIZE).map(move |col| Coord::new(row, col)))
            .filter(Coord::is_dark)
    }

    /// Get the cell at the specified coordinate; off-grid reads as empty
    pub fn get(&self, coord: Coord) -> Cell {
        if !coord.is_valid() {
            return Cell::Empty;
        }
        self.cells[coord.row as usize][coord.col as usize]
    }

    /// Copy of this board with `cell` written at `coord`
    pub fn with_cell(&self, coord: Coord, cell: Cell) -> Result<Board, GameError> {
        if !coord.is_valid() || (!cell.is_empty() && !coord.is_dark()) {
            return Err(GameError::InvalidCoordinate(coord));
        }
        let mut next = *self;
        next.cells[coord.row as usize][coord.col as usize] = cell;
        Ok(next)
    }

    /// Copy of this board with a piece of `side` placed at `coord`
    pub fn with_piece(&self, coord: Coord, side: Side) -> Result<Board, GameError> {
        self.with_cell(coord, Cell::piece(side))
    }

    /// Apply a move, returning the successor position.
    ///
    /// Only the preconditions are checked here: coordinates on the grid, a
    /// dark destination, a one-square diagonal step or a two-square diagonal
    /// jump over its midpoint, a piece at the origin, an empty destination
    /// and, for captures, an opposing piece on the jumped cell. Direction and
    /// mandatory capture are [`crate::Rules`]'s business.
    pub fn apply_move(&self, mv: &Move) -> Result<Board, GameError> {
        for coord in [Some(mv.from), Some(mv.to), mv.captured].into_iter().flatten() {
            if !coord.is_valid() {
                return Err(GameError::InvalidCoordinate(coord));
            }
        }
        if !mv.to.is_dark() {
            return Err(GameError::InvalidCoordinate(mv.to));
        }
        check_geometry(mv)?;

        let mover = self.get(mv.from).side().ok_or(GameError::EmptyOrigin(mv.from))?;
        if !self.get(mv.to).is_empty() {
            return Err(GameError::OccupiedDestination(mv.to));
        }

        let mut next = *self;
        next.cells[mv.to.row as usize][mv.to.col as usize] = Cell::piece(mover);
        next.cells[mv.from.row as usize][mv.from.col as usize] = Cell::Empty;

        if let Some(captured) = mv.captured {
            if self.get(captured).side() != Some(mover.opposite()) {
                return Err(GameError::InvalidCapture(captured));
            }
            next.cells[captured.row as usize][captured.col as usize] = Cell::Empty;
            tracing::trace!(%captured, by = %mover, "Piece captured");
        }

        Ok(next)
    }

    /// Coordinates of every piece owned by `side`
    pub fn pieces(&self, side: Side) -> impl Iterator<Item = Coord> + '_ {
        Self::dark_squares().filter(move |c| self.get(*c).side() == Some(side))
    }

    /// Count pieces of the specified side on the board
    pub fn count_pieces(&self, side: Side) -> usize {
        self.pieces(side).count()
    }

    /// The outcome once one side has no pieces left
    pub fn is_terminal(&self) -> Option<Outcome> {
        if self.count_pieces(Side::Player) == 0 {
            Some(Outcome {
                winner: Side::Opponent,
            })
        } else if self.count_pieces(Side::Opponent) == 0 {
            Some(Outcome {
                winner: Side::Player,
            })
        } else {
            None
        }
    }
}

/// Steps cover one diagonal square, jumps two with the capture in between
fn check_geometry(mv: &Move) -> Result<(), GameError> {
    let dr = mv.to.row.abs_diff(mv.from.row);
    let dc = mv.to.col.abs_diff(mv.from.col);
    match mv.captured {
        None if dr == 1 && dc == 1 => Ok(()),
        Some(captured) if dr == 2 && dc == 2 => {
            let midpoint = Coord::new((mv.from.row + mv.to.row) / 2, (mv.from.col + mv.to.col) / 2);
            if captured == midpoint {
                Ok(())
            } else {
                Err(GameError::InvalidCapture(captured))
            }
        }
        _ => Err(GameError::InvalidMove(format!("{} is not a diagonal step or jump", mv))),
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for cell in row {
                let symbol = match cell {
                    Cell::Empty => '.',
                    Cell::Player => 'p',
                    Cell::Opponent => 'o',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board(\n{})", self)
    }
}

/// Parses eight rows of `.`, `p` and `o`; blank lines and spaces are ignored
impl FromStr for Board {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rows: Vec<Vec<char>> = s
            .lines()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<Vec<_>>())
            .filter(|row| !row.is_empty())
            .collect();

        if rows.len() != N {
            return Err(GameError::InvalidLayout(format!(
                "expected {} rows, found {}",
                N,
                rows.len()
            )));
        }

        let mut board = Board::empty();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != N {
                return Err(GameError::InvalidLayout(format!(
                    "row {} has {} cells",
                    r,
                    row.len()
                )));
            }
            for (c, symbol) in row.iter().enumerate() {
                let cell = match symbol {
                    '.' => Cell::Empty,
                    'p' | 'P' => Cell::Player,
                    'o' | 'O' => Cell::Opponent,
                    other => {
                        return Err(GameError::InvalidLayout(format!(
                            "unexpected symbol '{}' at row {}",
                            other, r
                        )))
                    }
                };
                board = board.with_cell(Coord::new(r as u8, c as u8), cell)?;
            }
        }
        Ok(board)
    }
}
