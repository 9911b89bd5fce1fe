// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snake-and-ladders turn coordinator
//!
//! Same shape as the checkers coordinator with a single roll per turn. The
//! host generates the jump table and ships it in the game start so that both
//! peers play on the same layout.

use crate::config::SessionConfig;
use crate::coordinator::{admit, emit, new_event_channel, SyncError, DEFAULT_AI_DELAY};
use crate::handshake::Handshake;
use crate::messages::{BoardLayout, EventKind, GameOver, GameStart, GameType, Invite, SnakesMove, SyncMessage};
use crate::messenger::Messenger;
use crate::sequence::{OutboundSequence, SequenceTracker};
use crate::GameId;
use duelboard_core::{roll_dice, GameError, GameEvent, JumpTable, Landing, Side, SnakesGame};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::broadcast;

/// Who controls the non-local token
pub enum SnakesOpponent {
    /// Rolls and advances, no decisions involved
    Ai,
    Remote(Box<dyn Messenger>),
}

pub struct SnakesCoordinator {
    game_id: GameId,
    game: SnakesGame,
    local: Side,
    opponent: SnakesOpponent,
    /// Layout has been agreed with the peer
    started: bool,
    handshake: Handshake,
    /// Set once a desync is detected
    halted: bool,
    rng: StdRng,
    outbound: OutboundSequence,
    inbound: SequenceTracker<SyncMessage>,
    ai_delay: Duration,
    events_tx: broadcast::Sender<GameEvent>,
}

impl SnakesCoordinator {
    pub fn new(game_id: GameId, local: Side, table: JumpTable, opponent: SnakesOpponent, rng: StdRng) -> Self {
        tracing::info!(
            game_id = %game_id,
            %local,
            snakes = table.snakes().len(),
            ladders = table.ladders().len(),
            "Creating snakes game"
        );
        let handshake = match &opponent {
            SnakesOpponent::Ai => Handshake::Accepted,
            SnakesOpponent::Remote(_) => Handshake::Idle,
        };
        Self {
            game_id,
            game: SnakesGame::new(table),
            local,
            opponent,
            started: false,
            handshake,
            halted: false,
            rng,
            outbound: OutboundSequence::new(),
            inbound: SequenceTracker::new(),
            ai_delay: DEFAULT_AI_DELAY,
            events_tx: new_event_channel(),
        }
    }

    /// Local player against the dice-rolling AI on a freshly generated table
    pub fn vs_ai(mut rng: StdRng) -> Self {
        let table = JumpTable::generate(&mut rng);
        Self::new(crate::new_game_id(), Side::Player, table, SnakesOpponent::Ai, rng)
    }

    /// The inviting peer; generates the table and rolls first
    pub fn host(game_id: GameId, messenger: Box<dyn Messenger>, mut rng: StdRng) -> Self {
        let table = JumpTable::generate(&mut rng);
        Self::new(game_id, Side::Player, table, SnakesOpponent::Remote(messenger), rng)
    }

    /// The invited peer; learns the table from the game start
    pub fn guest(game_id: GameId, messenger: Box<dyn Messenger>) -> Self {
        Self::new(
            game_id,
            Side::Opponent,
            JumpTable::empty(),
            SnakesOpponent::Remote(messenger),
            StdRng::from_entropy(),
        )
    }

    /// Apply pacing and dedup settings from `config`
    pub fn with_config(mut self, config: &SessionConfig) -> Self {
        self.ai_delay = config.ai_delay();
        self.inbound = SequenceTracker::with_window(config.dedup_window);
        self
    }

    pub fn with_ai_delay(mut self, delay: Duration) -> Self {
        self.ai_delay = delay;
        self
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn game(&self) -> &SnakesGame {
        &self.game
    }

    pub fn local_side(&self) -> Side {
        self.local
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn winner(&self) -> Option<Side> {
        self.game.winner()
    }

    pub fn is_local_turn(&self) -> bool {
        self.started && self.game.winner().is_none() && self.game.to_move() == self.local
    }

    pub fn is_ai_turn(&self) -> bool {
        matches!(self.opponent, SnakesOpponent::Ai)
            && self.started
            && self.game.winner().is_none()
            && self.game.to_move() != self.local
    }

    /// Get a receiver for game events
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    /// Invite the peer; the game cannot start until the invite is accepted
    pub fn invite(&mut self, sender_id: &str, receiver_id: &str) -> Result<(), SyncError> {
        let _span = tracing::info_span!("snakes", op = "invite").entered();
        if self.handshake != Handshake::Idle {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "invite already exchanged".to_string(),
            )));
        }
        let invite = Invite {
            game_id: self.game_id.clone(),
            seq: self.outbound.peek(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            game_type: GameType::Snakes,
        };
        tracing::info!(game_id = %self.game_id, sender_id, receiver_id, "Sending invite");
        self.send(SyncMessage::Invite(invite))?;
        self.handshake = Handshake::Invited;
        Ok(())
    }

    /// Accept the invite received from the peer
    pub fn accept_invite(&mut self) -> Result<(), SyncError> {
        let _span = tracing::info_span!("snakes", op = "accept_invite").entered();
        let Some(invite) = self.handshake.pending_invite().cloned() else {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "no invite to accept".to_string(),
            )));
        };
        let reply = Invite {
            seq: self.outbound.peek(),
            ..invite
        };
        self.send(SyncMessage::InviteAccepted(reply))?;
        tracing::info!(game_id = %self.game_id, "Accepted invite");
        self.handshake = Handshake::Accepted;
        Ok(())
    }

    /// Begin play; against a peer this sends the layout
    pub fn start(&mut self, sender_id: &str, receiver_id: &str) -> Result<(), SyncError> {
        let _span = tracing::info_span!("snakes", op = "start").entered();
        if matches!(self.opponent, SnakesOpponent::Ai) {
            tracing::info!(game_id = %self.game_id, "Starting game against AI");
            self.started = true;
            return Ok(());
        }
        if !self.handshake.is_accepted() {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "invite has not been accepted".to_string(),
            )));
        }

        let msg = SyncMessage::SnakesGameStart(GameStart {
            game_id: self.game_id.clone(),
            seq: self.outbound.peek(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            layout: Some(BoardLayout::from(self.game.table())),
        });
        tracing::info!(game_id = %self.game_id, sender_id, receiver_id, "Sending game start");
        self.send(msg)?;
        self.started = true;
        Ok(())
    }

    /// Put both tokens back on the start square for another AI game.
    ///
    /// Peer games cannot be restarted since the peer would not follow.
    pub fn restart(&mut self) -> Result<(), SyncError> {
        let _span = tracing::info_span!("snakes", op = "restart").entered();
        if !matches!(self.opponent, SnakesOpponent::Ai) {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "only games against the AI can be restarted".to_string(),
            )));
        }
        tracing::info!(game_id = %self.game_id, "Restarting game");
        self.game.restart();
        emit(&self.events_tx, GameEvent::TurnPassed { to: self.game.to_move() });
        Ok(())
    }

    /// Roll for the local side and tell the peer where the token landed.
    ///
    /// The roll is applied to a copy of the game and only kept once the
    /// peer has been sent the result.
    pub fn roll(&mut self) -> Result<Landing, SyncError> {
        if !self.started {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "game has not started".to_string(),
            )));
        }
        let value = roll_dice(&mut self.rng);
        let mut next = self.game.clone();
        let landing = next
            .apply_roll(self.local, value)
            .map_err(SyncError::Rejected)?;

        let wire = SnakesMove {
            game_id: self.game_id.clone(),
            seq: self.outbound.peek(),
            side: self.local,
            dice_value: landing.roll,
            new_position: landing.to,
        };
        self.send(SyncMessage::SnakesMove(wire))?;
        self.game = next;
        self.announce(&landing);

        if landing.finished {
            let over = GameOver {
                game_id: self.game_id.clone(),
                seq: self.outbound.peek(),
                winner_side: self.local,
            };
            self.send(SyncMessage::SnakesGameOver(over))?;
        }
        Ok(landing)
    }

    /// Roll and advance for the AI, `None` when it is not the AI's turn
    pub fn play_ai_turn(&mut self) -> Result<Option<Landing>, SyncError> {
        if !self.is_ai_turn() {
            return Ok(None);
        }
        let ai = self.local.opposite();
        let value = roll_dice(&mut self.rng);
        let landing = self.game.apply_roll(ai, value).map_err(SyncError::Rejected)?;
        tracing::info!(roll = value, from = landing.from, to = landing.to, "AI rolled");
        self.announce(&landing);
        Ok(Some(landing))
    }

    /// [`play_ai_turn`](Self::play_ai_turn) after the configured pause
    pub async fn play_ai_turn_paced(&mut self) -> Result<Option<Landing>, SyncError> {
        if !self.is_ai_turn() {
            return Ok(None);
        }
        tokio::time::sleep(self.ai_delay).await;
        self.play_ai_turn()
    }

    /// Apply a message from the peer, returning how many were applied.
    ///
    /// As with checkers a desync halts the game for good.
    pub fn handle_inbound(&mut self, msg: SyncMessage) -> Result<usize, SyncError> {
        let _span = tracing::info_span!("snakes", op = "handle_inbound").entered();
        if self.halted {
            return Err(SyncError::Halted);
        }
        let ready = admit(&self.game_id, &EventKind::SNAKES, &mut self.inbound, msg)?;
        let count = ready.len();

        for (i, msg) in ready.into_iter().enumerate() {
            if let Err(e) = self.apply_remote(msg) {
                tracing::error!(error = %e, discarded = count - i - 1, "Inbound message rejected, halting sync");
                self.halted = true;
                return Err(e);
            }
        }
        Ok(count)
    }

    fn apply_remote(&mut self, msg: SyncMessage) -> Result<(), SyncError> {
        self.handshake.observe(&msg, GameType::Snakes)?;
        match msg {
            SyncMessage::Invite(_) | SyncMessage::InviteAccepted(_) => Ok(()),
            SyncMessage::SnakesGameStart(start) => {
                if self.started {
                    return Err(SyncError::Desync(GameError::InvalidMove(
                        "game already started".to_string(),
                    )));
                }
                if let Some(layout) = &start.layout {
                    let table = JumpTable::try_from(layout).map_err(SyncError::Desync)?;
                    self.game = SnakesGame::new(table);
                }
                tracing::info!(sender_id = %start.sender_id, "Peer started game");
                self.started = true;
                Ok(())
            }
            SyncMessage::SnakesMove(wire) => {
                let remote = self.local.opposite();
                if wire.side != remote {
                    return Err(SyncError::Desync(GameError::WrongSide(wire.side)));
                }
                let landing = self
                    .game
                    .set_position(remote, wire.dice_value, wire.new_position)
                    .map_err(SyncError::Desync)?;
                self.announce(&landing);
                Ok(())
            }
            SyncMessage::SnakesGameOver(over) => {
                if self.game.winner() == Some(over.winner_side) {
                    Ok(())
                } else {
                    Err(SyncError::Desync(GameError::InvalidMove(format!(
                        "peer reports {} won",
                        over.winner_side
                    ))))
                }
            }
            other => Err(SyncError::UnexpectedMessage(other.kind())),
        }
    }

    fn announce(&self, landing: &Landing) {
        emit(
            &self.events_tx,
            GameEvent::DiceRolled {
                side: landing.side,
                value: landing.roll,
            },
        );
        emit(
            &self.events_tx,
            GameEvent::PositionChanged {
                side: landing.side,
                from: landing.from,
                to: landing.to,
                jump: landing.jump,
            },
        );
        if landing.finished {
            tracing::info!(game_id = %self.game_id, winner = %landing.side, "Game over");
            emit(&self.events_tx, GameEvent::GameEnded { winner: landing.side });
        } else {
            emit(&self.events_tx, GameEvent::TurnPassed { to: self.game.to_move() });
        }
    }

    /// Hand `msg` to the peer; its sequence number is spent only on success
    fn send(&mut self, msg: SyncMessage) -> Result<(), SyncError> {
        if let SnakesOpponent::Remote(messenger) = &self.opponent {
            tracing::debug!(kind = %msg.kind(), seq = msg.sequence(), "Sending sync message");
            messenger.send(msg)?;
            self.outbound.advance();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::{LocalLink, MemoryOutbox, TransportError};

    fn accepted(mut game: SnakesCoordinator) -> SnakesCoordinator {
        game.handshake = Handshake::Accepted;
        game
    }

    #[test]
    fn test_roll_before_start_is_rejected() {
        let mut game = SnakesCoordinator::vs_ai(StdRng::seed_from_u64(1));
        assert!(matches!(game.roll(), Err(SyncError::Rejected(_))));
    }

    #[test]
    fn test_ai_game_alternates() {
        // No ladders, so a single roll can never finish the game
        let mut game = SnakesCoordinator::new(
            "g".into(),
            Side::Player,
            JumpTable::empty(),
            SnakesOpponent::Ai,
            StdRng::seed_from_u64(2),
        );
        game.start("me", "ai").unwrap();
        assert!(game.play_ai_turn().unwrap().is_none());

        let landing = game.roll().unwrap();
        assert_eq!(landing.side, Side::Player);
        assert!(game.is_ai_turn());

        let ai = game.play_ai_turn().unwrap().unwrap();
        assert_eq!(ai.side, Side::Opponent);
        assert!(game.is_local_turn());
    }

    #[test]
    fn test_host_sends_layout_and_moves() {
        let outbox = MemoryOutbox::new();
        let mut host =
            accepted(SnakesCoordinator::host("g".into(), Box::new(outbox.clone()), StdRng::seed_from_u64(3)));
        host.start("alice", "bob").unwrap();
        host.roll().unwrap();

        let sent = outbox.take();
        let SyncMessage::SnakesGameStart(start) = &sent[0] else {
            panic!("expected game start first");
        };
        let layout = start.layout.as_ref().unwrap();
        assert_eq!(JumpTable::try_from(layout).unwrap(), *host.game().table());
        assert_eq!(sent[1].kind(), EventKind::SnakesMove);
        assert_eq!(sent[1].sequence(), 1);
    }

    #[test]
    fn test_out_of_range_position_is_desync() {
        let mut guest = accepted(SnakesCoordinator::guest("g".into(), Box::new(MemoryOutbox::new())));
        let start = SyncMessage::SnakesGameStart(GameStart {
            game_id: "g".into(),
            seq: 0,
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
            layout: Some(BoardLayout::from(&JumpTable::empty())),
        });
        assert_eq!(guest.handle_inbound(start).unwrap(), 1);

        let bad = SyncMessage::SnakesMove(SnakesMove {
            game_id: "g".into(),
            seq: 1,
            side: Side::Player,
            dice_value: 3,
            new_position: 140,
        });
        assert!(matches!(guest.handle_inbound(bad), Err(SyncError::Desync(_))));
        assert_eq!(guest.game().position(Side::Player), 0);
    }

    #[test]
    fn test_invite_gates_start() {
        let host_out = MemoryOutbox::new();
        let guest_out = MemoryOutbox::new();
        let mut host = SnakesCoordinator::host("g".into(), Box::new(host_out.clone()), StdRng::seed_from_u64(4));
        let mut guest = SnakesCoordinator::guest("g".into(), Box::new(guest_out.clone()));

        host.invite("alice", "bob").unwrap();
        assert!(matches!(host.start("alice", "bob"), Err(SyncError::Rejected(_))));
        assert!(!host.is_started());

        for msg in host_out.take() {
            guest.handle_inbound(msg).unwrap();
        }
        assert_eq!(
            guest.handshake().pending_invite().map(|i| i.game_type),
            Some(GameType::Snakes)
        );
        guest.accept_invite().unwrap();
        for msg in guest_out.take() {
            host.handle_inbound(msg).unwrap();
        }

        host.start("alice", "bob").unwrap();
        assert!(host.is_local_turn());
        for msg in host_out.take() {
            guest.handle_inbound(msg).unwrap();
        }
        assert!(guest.is_started());
        assert_eq!(guest.game().table(), host.game().table());
    }

    #[test]
    fn test_wrong_game_type_invite_is_desync() {
        let mut guest = SnakesCoordinator::guest("g".into(), Box::new(MemoryOutbox::new()));
        let invite = SyncMessage::Invite(Invite {
            game_id: "g".into(),
            seq: 0,
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
            game_type: GameType::Checkers,
        });
        assert!(matches!(guest.handle_inbound(invite), Err(SyncError::Desync(_))));
        assert!(guest.handshake().pending_invite().is_none());
    }

    #[test]
    fn test_failed_send_keeps_roll_unapplied() {
        let (near, far) = LocalLink::pair();
        let (sender, _receiver) = near.into_split();
        let mut host = accepted(SnakesCoordinator::host("g".into(), Box::new(sender), StdRng::seed_from_u64(5)));
        host.start("alice", "bob").unwrap();
        drop(far);

        let err = host.roll().unwrap_err();
        assert!(matches!(err, SyncError::Transport(TransportError::Closed)));
        assert_eq!(host.game().position(Side::Player), 0);
        assert_eq!(host.game().to_move(), Side::Player);
        assert_eq!(host.outbound.peek(), 1);
    }

    #[test]
    fn test_restart_after_ai_game() {
        let mut game = SnakesCoordinator::new(
            "g".into(),
            Side::Player,
            JumpTable::empty(),
            SnakesOpponent::Ai,
            StdRng::seed_from_u64(6),
        );
        game.start("me", "ai").unwrap();
        game.roll().unwrap();
        game.play_ai_turn().unwrap();

        game.restart().unwrap();
        assert_eq!(game.game().position(Side::Player), 0);
        assert_eq!(game.game().position(Side::Opponent), 0);
        assert!(game.is_local_turn());

        let mut peer = SnakesCoordinator::host("g".into(), Box::new(MemoryOutbox::new()), StdRng::seed_from_u64(7));
        assert!(matches!(peer.restart(), Err(SyncError::Rejected(_))));
    }

    #[test]
    fn test_desync_halts_later_messages() {
        let mut guest = accepted(SnakesCoordinator::guest("g".into(), Box::new(MemoryOutbox::new())));
        let wrong_side = SyncMessage::SnakesMove(SnakesMove {
            game_id: "g".into(),
            seq: 0,
            side: Side::Opponent,
            dice_value: 2,
            new_position: 2,
        });
        assert!(matches!(guest.handle_inbound(wrong_side), Err(SyncError::Desync(_))));

        let start = SyncMessage::SnakesGameStart(GameStart {
            game_id: "g".into(),
            seq: 1,
            sender_id: "alice".into(),
            receiver_id: "bob".into(),
            layout: None,
        });
        assert!(matches!(guest.handle_inbound(start), Err(SyncError::Halted)));
        assert!(!guest.is_started());
    }
}
