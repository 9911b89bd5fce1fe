// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message types exchanged between two peers of a game

use crate::GameId;
use duelboard_core::{Coord, GameError, JumpTable, Move, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which game an invite is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Checkers,
    Snakes,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Checkers => "checkers",
            GameType::Snakes => "snakes",
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invitation to play, and the same payload echoed back on acceptance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub game_id: GameId,
    pub seq: u64,
    /// User that sent the invite
    pub sender_id: String,
    /// User that was invited
    pub receiver_id: String,
    pub game_type: GameType,
}

/// Announces a new game to the invited peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    /// Game ID shared by both peers
    pub game_id: GameId,
    /// Sender's outbound sequence number
    pub seq: u64,
    /// User that created the game
    pub sender_id: String,
    /// User that was invited
    pub receiver_id: String,
    /// Snake and ladder layout, snakes games only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<BoardLayout>,
}

/// A single checkers move as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckersMove {
    pub game_id: GameId,
    pub seq: u64,
    /// Side that made the move
    pub side: Side,
    pub from_row: u8,
    pub from_col: u8,
    pub to_row: u8,
    pub to_col: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_row: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_col: Option<u8>,
    /// The same piece must capture again before the turn passes
    #[serde(default)]
    pub continues: bool,
}

impl CheckersMove {
    pub fn new(game_id: GameId, seq: u64, side: Side, mv: &Move, continues: bool) -> Self {
        Self {
            game_id,
            seq,
            side,
            from_row: mv.from.row,
            from_col: mv.from.col,
            to_row: mv.to.row,
            to_col: mv.to.col,
            captured_row: mv.captured.map(|c| c.row),
            captured_col: mv.captured.map(|c| c.col),
            continues,
        }
    }

    /// Rebuild the board move; a half-specified capture cell is rejected
    pub fn to_move(&self) -> Result<Move, GameError> {
        let from = Coord::new(self.from_row, self.from_col);
        let to = Coord::new(self.to_row, self.to_col);
        match (self.captured_row, self.captured_col) {
            (Some(row), Some(col)) => Ok(Move::jump(from, Coord::new(row, col), to)),
            (None, None) => Ok(Move::step(from, to)),
            _ => Err(GameError::InvalidMove(
                "captured cell needs both row and column".to_string(),
            )),
        }
    }
}

/// A snake-and-ladders roll and its resulting square
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnakesMove {
    pub game_id: GameId,
    pub seq: u64,
    pub side: Side,
    pub dice_value: u8,
    pub new_position: u8,
}

/// Final result of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOver {
    pub game_id: GameId,
    pub seq: u64,
    pub winner_side: Side,
}

/// Wire form of a [`JumpTable`] as `[from, to]` pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLayout {
    pub snakes: Vec<(u8, u8)>,
    pub ladders: Vec<(u8, u8)>,
}

impl From<&JumpTable> for BoardLayout {
    fn from(table: &JumpTable) -> Self {
        Self {
            snakes: table.snakes().iter().map(|(&k, &v)| (k, v)).collect(),
            ladders: table.ladders().iter().map(|(&k, &v)| (k, v)).collect(),
        }
    }
}

impl TryFrom<&BoardLayout> for JumpTable {
    type Error = GameError;

    fn try_from(layout: &BoardLayout) -> Result<Self, Self::Error> {
        let snakes: BTreeMap<u8, u8> = layout.snakes.iter().copied().collect();
        let ladders: BTreeMap<u8, u8> = layout.ladders.iter().copied().collect();
        if snakes.len() != layout.snakes.len() || ladders.len() != layout.ladders.len() {
            return Err(GameError::InvalidTable("repeated start square".to_string()));
        }
        JumpTable::new(snakes, ladders)
    }
}

/// Event kinds carried by the messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Invite,
    InviteAccepted,
    CheckersGameStart,
    CheckersMove,
    CheckersGameOver,
    SnakesGameStart,
    SnakesMove,
    SnakesGameOver,
}

impl EventKind {
    /// Kinds handled by a checkers game
    pub const CHECKERS: [EventKind; 5] = [
        EventKind::Invite,
        EventKind::InviteAccepted,
        EventKind::CheckersGameStart,
        EventKind::CheckersMove,
        EventKind::CheckersGameOver,
    ];

    /// Kinds handled by a snakes game
    pub const SNAKES: [EventKind; 5] = [
        EventKind::Invite,
        EventKind::InviteAccepted,
        EventKind::SnakesGameStart,
        EventKind::SnakesMove,
        EventKind::SnakesGameOver,
    ];

    /// Event name on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Invite => "invite",
            EventKind::InviteAccepted => "invite-accepted",
            EventKind::CheckersGameStart => "checkers-game-start",
            EventKind::CheckersMove => "checkers-move",
            EventKind::CheckersGameOver => "checkers-game-over",
            EventKind::SnakesGameStart => "snakes-game-start",
            EventKind::SnakesMove => "snakes-move",
            EventKind::SnakesGameOver => "snakes-game-over",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper for all message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncMessage {
    Invite(Invite),
    InviteAccepted(Invite),
    CheckersGameStart(GameStart),
    CheckersMove(CheckersMove),
    CheckersGameOver(GameOver),
    SnakesGameStart(GameStart),
    SnakesMove(SnakesMove),
    SnakesGameOver(GameOver),
}

impl SyncMessage {
    /// Get the game ID for any message type
    pub fn game_id(&self) -> &str {
        match self {
            SyncMessage::Invite(msg) | SyncMessage::InviteAccepted(msg) => &msg.game_id,
            SyncMessage::CheckersGameStart(msg) | SyncMessage::SnakesGameStart(msg) => &msg.game_id,
            SyncMessage::CheckersMove(msg) => &msg.game_id,
            SyncMessage::SnakesMove(msg) => &msg.game_id,
            SyncMessage::CheckersGameOver(msg) | SyncMessage::SnakesGameOver(msg) => &msg.game_id,
        }
    }

    /// Get the sender's sequence number for any message type
    pub fn sequence(&self) -> u64 {
        match self {
            SyncMessage::Invite(msg) | SyncMessage::InviteAccepted(msg) => msg.seq,
            SyncMessage::CheckersGameStart(msg) | SyncMessage::SnakesGameStart(msg) => msg.seq,
            SyncMessage::CheckersMove(msg) => msg.seq,
            SyncMessage::SnakesMove(msg) => msg.seq,
            SyncMessage::CheckersGameOver(msg) | SyncMessage::SnakesGameOver(msg) => msg.seq,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SyncMessage::Invite(_) => EventKind::Invite,
            SyncMessage::InviteAccepted(_) => EventKind::InviteAccepted,
            SyncMessage::CheckersGameStart(_) => EventKind::CheckersGameStart,
            SyncMessage::CheckersMove(_) => EventKind::CheckersMove,
            SyncMessage::CheckersGameOver(_) => EventKind::CheckersGameOver,
            SyncMessage::SnakesGameStart(_) => EventKind::SnakesGameStart,
            SyncMessage::SnakesMove(_) => EventKind::SnakesMove,
            SyncMessage::SnakesGameOver(_) => EventKind::SnakesGameOver,
        }
    }

    /// Serialize the message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize a message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the message to CBOR
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    /// Deserialize a message from CBOR
    pub fn from_cbor(cbor: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(cbor)
    }
}
