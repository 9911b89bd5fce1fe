// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invite exchange that precedes a game between two peers
//!
//! The host sends an invite and stays out of its turn until the guest
//! answers with an acceptance. Games against the AI skip the exchange.

use crate::coordinator::SyncError;
use crate::messages::{GameType, Invite, SyncMessage};
use duelboard_core::GameError;

/// Progress of the invite exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Nothing sent or received yet
    Idle,
    /// Invite sent, waiting for the answer
    Invited,
    /// The peer invited us
    Received(Invite),
    /// Both peers agreed to play
    Accepted,
}

impl Handshake {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Handshake::Accepted)
    }

    /// The invite waiting for an answer, if any
    pub fn pending_invite(&self) -> Option<&Invite> {
        match self {
            Handshake::Received(invite) => Some(invite),
            _ => None,
        }
    }

    /// Advance on an inbound message.
    ///
    /// Invites and acceptances must arrive in order and for `game_type`;
    /// any other message is refused until the exchange has completed.
    pub(crate) fn observe(&mut self, msg: &SyncMessage, game_type: GameType) -> Result<(), SyncError> {
        match msg {
            SyncMessage::Invite(invite) => {
                check_game_type(invite, game_type)?;
                if *self != Handshake::Idle {
                    return Err(desync("invite arrived twice"));
                }
                tracing::info!(sender_id = %invite.sender_id, %game_type, "Received invite");
                *self = Handshake::Received(invite.clone());
                Ok(())
            }
            SyncMessage::InviteAccepted(invite) => {
                check_game_type(invite, game_type)?;
                if *self != Handshake::Invited {
                    return Err(desync("acceptance without an invite"));
                }
                tracing::info!(receiver_id = %invite.receiver_id, "Invite accepted");
                *self = Handshake::Accepted;
                Ok(())
            }
            _ if self.is_accepted() => Ok(()),
            _ => Err(desync("game has not been accepted")),
        }
    }
}

fn check_game_type(invite: &Invite, expected: GameType) -> Result<(), SyncError> {
    if invite.game_type == expected {
        Ok(())
    } else {
        Err(SyncError::Desync(GameError::InvalidMove(format!(
            "invite is for {}, not {}",
            invite.game_type, expected
        ))))
    }
}

fn desync(reason: &str) -> SyncError {
    SyncError::Desync(GameError::InvalidMove(reason.to_string()))
}
