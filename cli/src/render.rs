// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII rendering for the CLI.

use duelboard_core::{board::Board, Cell, Coord, Jump, Side, SnakesGame, BOARD_SIZE};

/// Render the checkers board, marking `highlights` with `*`
pub fn render_board(board: &Board, highlights: &[Coord]) -> String {
    let mut output = String::new();

    // Add column labels
    output.push_str("  ");
    for col in 0..BOARD_SIZE {
        output.push_str(&format!(" {}", col));
    }
    output.push('\n');

    for row in 0..BOARD_SIZE {
        output.push_str(&format!("{} ", row));
        for col in 0..BOARD_SIZE {
            let coord = Coord::new(row, col);
            let symbol = match board.get(coord) {
                Cell::Player => 'p',
                Cell::Opponent => 'o',
                Cell::Empty if highlights.contains(&coord) => '*',
                Cell::Empty if coord.is_dark() => '.',
                Cell::Empty => ' ',
            };
            output.push(' ');
            output.push(symbol);
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "pieces: player {} - opponent {}\n",
        board.count_pieces(Side::Player),
        board.count_pieces(Side::Opponent)
    ));
    output
}

/// Render both token positions
pub fn render_snakes(game: &SnakesGame) -> String {
    format!(
        "player on {:>3} | opponent on {:>3} | {} to roll\n",
        game.position(Side::Player),
        game.position(Side::Opponent),
        game.to_move()
    )
}

/// Render the snake and ladder layout
pub fn render_table(game: &SnakesGame) -> String {
    let pairs = |map: &std::collections::BTreeMap<u8, u8>| {
        map.iter()
            .map(|(from, to)| format!("{}->{}", from, to))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "snakes:  {}\nladders: {}\n",
        pairs(game.table().snakes()),
        pairs(game.table().ladders())
    )
}

pub fn describe_jump(jump: Option<Jump>) -> String {
    match jump {
        Some(Jump::Snake { from, to }) => format!(" (snake {} -> {})", from, to),
        Some(Jump::Ladder { from, to }) => format!(" (ladder {} -> {})", from, to),
        None => String::new(),
    }
}
