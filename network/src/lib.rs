// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duelboard Network - turn coordination and peer synchronization
//!
//! This crate provides the layer between the pure game rules and a push-based
//! messaging channel:
//! - Wire messages for invites, game start, moves and game over
//! - The invite exchange that gates the first move
//! - An abstract messaging collaborator with in-process implementations
//! - Per-peer sequence tracking that drops duplicates and reorders gaps
//! - Turn coordinators for checkers and snake-and-ladders
//! - An explicit reconnect state machine and persisted session config

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod handshake;
pub mod messages;
pub mod messenger;
pub mod sequence;
pub mod snakes_coordinator;

// Type aliases
pub type GameId = String;

/// Create a fresh random game id
pub fn new_game_id() -> GameId {
    uuid::Uuid::new_v4().to_string()
}

// Re-exports
pub use config::SessionConfig;
pub use connection::{ConnectionTracker, LinkState, ReconnectPolicy};
pub use coordinator::{CheckersCoordinator, Opponent, Phase, SyncError, TapOutcome};
pub use handshake::Handshake;
pub use messages::{EventKind, GameType, Invite, SyncMessage};
pub use messenger::{
    LinkReceiver, LinkSender, LocalLink, MemoryOutbox, MessageRouter, Messenger, TransportError,
};
pub use sequence::{OutboundSequence, SequenceError, SequenceTracker};
pub use snakes_coordinator::{SnakesCoordinator, SnakesOpponent};
