// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkers turn coordinator
//!
//! Drives whose turn it is, feeds local taps and inbound peer messages to the
//! board, runs the AI opponent and emits one sync message per applied move.
//! Every handler runs to completion before the next event is processed, so
//! the board has exactly one writer at a time.

use crate::config::SessionConfig;
use crate::handshake::Handshake;
use crate::messages::{CheckersMove, EventKind, GameOver, GameStart, GameType, Invite, SyncMessage};
use crate::messenger::{Messenger, TransportError};
use crate::sequence::{OutboundSequence, SequenceError, SequenceTracker};
use crate::GameId;
use duelboard_core::{
    board::Board, has_further_capture, legal_moves, Coord, GameError, GameEvent, Move,
    MovePolicy, Outcome, Rules, Side,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Pause before the AI moves so its play does not feel instantaneous
pub const DEFAULT_AI_DELAY: Duration = Duration::from_millis(1000);

/// Capacity of the game event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Errors surfaced by the turn coordinators
#[derive(Debug, Error)]
pub enum SyncError {
    /// An inbound message does not fit the local board; nothing was applied
    #[error("Peer state diverged: {0}")]
    Desync(#[source] GameError),

    /// A local action was refused by the rules
    #[error("Move rejected: {0}")]
    Rejected(#[source] GameError),

    /// A message for some other game reached this coordinator
    #[error("Message for game {got} delivered to game {expected}")]
    WrongGame { expected: GameId, got: String },

    /// A message kind this coordinator does not handle
    #[error("Unexpected {0} message")]
    UnexpectedMessage(EventKind),

    /// An earlier desync stopped this game; no further messages are applied
    #[error("Synchronization halted after an earlier desync")]
    Halted,

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Where the coordinator is in the turn cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Local side to move, nothing selected
    AwaitingSelection,
    /// A local piece is selected and its legal moves are highlighted
    AwaitingDestination {
        from: Coord,
        moves: Vec<Move>,
        /// Selection forced by a capture chain; it cannot be changed
        chained: bool,
    },
    /// Waiting on the AI timer or a peer message
    AwaitingOpponent,
    Terminal(Outcome),
}

/// Who controls the non-local side
pub enum Opponent {
    Ai(Box<dyn MovePolicy>),
    Remote(Box<dyn Messenger>),
}

/// Result of a local tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// Not a selectable piece or a highlighted destination
    Ignored,
    /// A piece was selected; these are its legal moves
    Selected(Vec<Move>),
    /// A move was applied
    Moved {
        mv: Move,
        /// The same piece must capture again
        continues: bool,
    },
}

/// Checks shared by both coordinators before an inbound message reaches the rules
pub(crate) fn admit(
    game_id: &str,
    kinds: &[EventKind],
    tracker: &mut SequenceTracker<SyncMessage>,
    msg: SyncMessage,
) -> Result<Vec<SyncMessage>, SyncError> {
    if msg.game_id() != game_id {
        return Err(SyncError::WrongGame {
            expected: game_id.to_string(),
            got: msg.game_id().to_string(),
        });
    }
    if !kinds.contains(&msg.kind()) {
        return Err(SyncError::UnexpectedMessage(msg.kind()));
    }
    Ok(tracker.accept(msg.sequence(), msg)?)
}

pub(crate) fn new_event_channel() -> broadcast::Sender<GameEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

pub(crate) fn emit(events_tx: &broadcast::Sender<GameEvent>, event: GameEvent) {
    // No receivers is normal for headless play
    if events_tx.send(event).is_err() {
        tracing::trace!("No event subscribers");
    }
}

/// Coordinates one checkers game between the local side and an opponent
pub struct CheckersCoordinator {
    game_id: GameId,
    board: Board,
    local: Side,
    to_move: Side,
    phase: Phase,
    /// Piece that must keep capturing, for whichever side is moving
    chain: Option<Coord>,
    opponent: Opponent,
    outbound: OutboundSequence,
    inbound: SequenceTracker<SyncMessage>,
    peer_id: Option<String>,
    handshake: Handshake,
    /// Set once a desync is detected
    halted: bool,
    ai_delay: Duration,
    events_tx: broadcast::Sender<GameEvent>,
}

impl CheckersCoordinator {
    /// Create a coordinator where `local` plays against `opponent`
    pub fn new(game_id: GameId, local: Side, opponent: Opponent) -> Self {
        let _span = tracing::info_span!("checkers", op = "new").entered();
        tracing::info!(game_id = %game_id, %local, "Creating checkers game");

        let handshake = match &opponent {
            Opponent::Ai(_) => Handshake::Accepted,
            Opponent::Remote(_) => Handshake::Idle,
        };
        let mut coordinator = Self {
            game_id,
            board: Board::new(),
            local,
            to_move: Side::Player,
            phase: Phase::AwaitingOpponent,
            chain: None,
            opponent,
            outbound: OutboundSequence::new(),
            inbound: SequenceTracker::new(),
            peer_id: None,
            handshake,
            halted: false,
            ai_delay: DEFAULT_AI_DELAY,
            events_tx: new_event_channel(),
        };
        coordinator.phase = coordinator.idle_phase();
        coordinator
    }

    /// Local player against an AI policy
    pub fn vs_ai(policy: Box<dyn MovePolicy>) -> Self {
        Self::new(crate::new_game_id(), Side::Player, Opponent::Ai(policy))
    }

    /// The inviting peer; plays the side that moves first
    pub fn host(game_id: GameId, messenger: Box<dyn Messenger>) -> Self {
        Self::new(game_id, Side::Player, Opponent::Remote(messenger))
    }

    /// The invited peer
    pub fn guest(game_id: GameId, messenger: Box<dyn Messenger>) -> Self {
        Self::new(game_id, Side::Opponent, Opponent::Remote(messenger))
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

    /// Start from an arbitrary position with `to_move` acting
    pub fn with_position(mut self, board: Board, to_move: Side) -> Self {
        self.board = board;
        self.to_move = to_move;
        self.chain = None;
        self.phase = match board.is_terminal() {
            Some(outcome) => Phase::Terminal(outcome),
            None => self.idle_phase(),
        };
        self
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn local_side(&self) -> Side {
        self.local
    }

    pub fn to_move(&self) -> Side {
        self.to_move
    }

    pub fn ai_delay(&self) -> Duration {
        self.ai_delay
    }

    /// User id of the peer that invited us or started the game, if any
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_local_turn(&self) -> bool {
        self.outcome().is_none() && self.to_move == self.local && self.handshake.is_accepted()
    }

    /// Whether the AI should be asked for a move now
    pub fn is_ai_turn(&self) -> bool {
        matches!(self.opponent, Opponent::Ai(_))
            && self.outcome().is_none()
            && self.to_move != self.local
    }

    /// Get a receiver for game events
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    /// Moves the local side may make right now
    pub fn local_candidates(&self) -> Vec<Move> {
        if !self.is_local_turn() {
            return Vec::new();
        }
        match self.chain {
            Some(at) => legal_moves(&self.board, self.local, at),
            None => Rules::new(&self.board).all_legal_moves(self.local),
        }
    }

    /// Invite the peer. The local side cannot move until the invite is accepted.
    pub fn invite(&mut self, sender_id: &str, receiver_id: &str) -> Result<(), SyncError> {
        let _span = tracing::info_span!("checkers", op = "invite").entered();
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
            game_type: GameType::Checkers,
        };
        tracing::info!(game_id = %self.game_id, sender_id, receiver_id, "Sending invite");
        self.send(SyncMessage::Invite(invite))?;
        self.handshake = Handshake::Invited;
        Ok(())
    }

    /// Accept the invite received from the peer
    pub fn accept_invite(&mut self) -> Result<(), SyncError> {
        let _span = tracing::info_span!("checkers", op = "accept_invite").entered();
        let Some(invite) = self.handshake.pending_invite().cloned() else {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "no invite to accept".to_string(),
            )));
        };
        let peer = invite.sender_id.clone();
        let reply = Invite {
            seq: self.outbound.peek(),
            ..invite
        };
        self.send(SyncMessage::InviteAccepted(reply))?;
        tracing::info!(game_id = %self.game_id, peer_id = %peer, "Accepted invite");
        self.peer_id = Some(peer);
        self.handshake = Handshake::Accepted;
        if self.outcome().is_none() {
            self.phase = self.idle_phase();
        }
        Ok(())
    }

    /// Announce the game to the peer; a no-op against the AI
    pub fn start(&mut self, sender_id: &str, receiver_id: &str) -> Result<(), SyncError> {
        let _span = tracing::info_span!("checkers", op = "start").entered();
        if matches!(self.opponent, Opponent::Ai(_)) {
            tracing::info!(game_id = %self.game_id, "Starting game against AI");
            return Ok(());
        }
        if !self.handshake.is_accepted() {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "invite has not been accepted".to_string(),
            )));
        }

        let msg = SyncMessage::CheckersGameStart(GameStart {
            game_id: self.game_id.clone(),
            seq: self.outbound.peek(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            layout: None,
        });
        tracing::info!(game_id = %self.game_id, sender_id, receiver_id, "Sending game start");
        self.send(msg)
    }

    /// Handle a tap on `at`: select a piece or pick a highlighted destination
    pub fn tap(&mut self, at: Coord) -> Result<TapOutcome, SyncError> {
        if !self.is_local_turn() {
            return Ok(TapOutcome::Ignored);
        }

        let (target, chained) = match &self.phase {
            Phase::AwaitingDestination { moves, chained, .. } => {
                (moves.iter().find(|m| m.to == at).copied(), *chained)
            }
            _ => (None, false),
        };
        if let Some(mv) = target {
            let continues = self.play_local_move(mv)?;
            return Ok(TapOutcome::Moved { mv, continues });
        }
        if chained {
            return Ok(TapOutcome::Ignored);
        }

        if self.board.get(at).side() != Some(self.local) {
            return Ok(TapOutcome::Ignored);
        }
        let moves = legal_moves(&self.board, self.local, at);
        if moves.is_empty() {
            return Ok(TapOutcome::Ignored);
        }
        tracing::debug!(%at, moves = moves.len(), "Selected piece");
        self.phase = Phase::AwaitingDestination {
            from: at,
            moves: moves.clone(),
            chained: false,
        };
        Ok(TapOutcome::Selected(moves))
    }

    /// Apply a local move, returning whether the same piece must capture again.
    ///
    /// Against a peer the move is sent first and only committed once the
    /// transport took it; a send failure leaves the game as it was.
    pub fn play_local_move(&mut self, mv: Move) -> Result<bool, SyncError> {
        if !self.handshake.is_accepted() {
            return Err(SyncError::Rejected(GameError::InvalidMove(
                "invite has not been accepted".to_string(),
            )));
        }
        if let Some(outcome) = self.outcome() {
            return Err(SyncError::Rejected(GameError::InvalidMove(format!(
                "game already won by {}",
                outcome.winner
            ))));
        }
        if self.to_move != self.local {
            return Err(SyncError::Rejected(GameError::WrongSide(self.local)));
        }
        if let Some(at) = self.chain {
            if mv.from != at {
                return Err(SyncError::Rejected(GameError::InvalidMove(format!(
                    "piece at {} must keep capturing",
                    at
                ))));
            }
        }
        Rules::new(&self.board)
            .check_move(self.local, &mv)
            .map_err(SyncError::Rejected)?;

        let next = self.board.apply_move(&mv).map_err(SyncError::Rejected)?;
        let continues = chain_continues(&next, self.local, &mv);

        let wire = CheckersMove::new(self.game_id.clone(), self.outbound.peek(), self.local, &mv, continues);
        self.send(SyncMessage::CheckersMove(wire))?;
        let chained = self.commit(self.local, mv, next);
        debug_assert_eq!(chained, continues);

        if let Some(outcome) = self.outcome() {
            let over = GameOver {
                game_id: self.game_id.clone(),
                seq: self.outbound.peek(),
                winner_side: outcome.winner,
            };
            self.send(SyncMessage::CheckersGameOver(over))?;
        }
        Ok(continues)
    }

    /// Let `policy` play the whole local turn, capture chains included
    pub fn play_policy_turn(&mut self, policy: &mut dyn MovePolicy) -> Result<Vec<Move>, SyncError> {
        let mut played = Vec::new();
        while self.is_local_turn() {
            let Some(mv) = pick(policy, &self.board, self.local, self.chain) else {
                tracing::warn!(side = %self.local, "Local side has no legal move");
                break;
            };
            played.push(mv);
            if !self.play_local_move(mv)? {
                break;
            }
        }
        Ok(played)
    }

    /// Let the AI play its whole turn, capture chains included.
    ///
    /// An AI without any legal move passes the turn back.
    pub fn play_ai_turn(&mut self) -> Result<Vec<Move>, SyncError> {
        let _span = tracing::info_span!("checkers", op = "play_ai_turn").entered();
        let ai = self.local.opposite();
        let mut played = Vec::new();

        while self.is_ai_turn() {
            let board = self.board;
            let choice = match &mut self.opponent {
                Opponent::Ai(policy) => pick(policy.as_mut(), &board, ai, self.chain),
                Opponent::Remote(_) => None,
            };

            let Some(mv) = choice else {
                if played.is_empty() {
                    tracing::warn!(side = %ai, "AI has no legal move, passing the turn");
                    self.pass_turn(ai);
                }
                break;
            };

            tracing::info!(%mv, "AI move");
            let next = self.board.apply_move(&mv).map_err(SyncError::Rejected)?;
            played.push(mv);
            if !self.commit(ai, mv, next) {
                break;
            }
        }
        Ok(played)
    }

    /// [`play_ai_turn`](Self::play_ai_turn) after the configured pause
    pub async fn play_ai_turn_paced(&mut self) -> Result<Vec<Move>, SyncError> {
        if !self.is_ai_turn() {
            return Ok(Vec::new());
        }
        tokio::time::sleep(self.ai_delay).await;
        self.play_ai_turn()
    }

    /// Apply a message from the peer.
    ///
    /// Duplicates are dropped and early messages are held until the gap is
    /// filled. Returns how many messages were applied. A message that does
    /// not fit the local board leaves it untouched and yields
    /// [`SyncError::Desync`].
    ///
    /// A desync ends synchronization for the game: messages released
    /// together with the bad one are discarded and every later call returns
    /// [`SyncError::Halted`].
    pub fn handle_inbound(&mut self, msg: SyncMessage) -> Result<usize, SyncError> {
        let _span = tracing::info_span!("checkers", op = "handle_inbound").entered();
        if self.halted {
            return Err(SyncError::Halted);
        }
        let ready = admit(&self.game_id, &EventKind::CHECKERS, &mut self.inbound, msg)?;
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
        self.handshake.observe(&msg, GameType::Checkers)?;
        match msg {
            SyncMessage::Invite(invite) => {
                self.peer_id = Some(invite.sender_id);
                Ok(())
            }
            SyncMessage::InviteAccepted(_) => {
                if self.outcome().is_none() {
                    self.phase = self.idle_phase();
                }
                Ok(())
            }
            SyncMessage::CheckersGameStart(start) => {
                tracing::info!(
                    game_id = %start.game_id,
                    sender_id = %start.sender_id,
                    receiver_id = %start.receiver_id,
                    "Peer started game"
                );
                self.peer_id = Some(start.sender_id);
                Ok(())
            }
            SyncMessage::CheckersMove(wire) => self.apply_remote_move(&wire),
            SyncMessage::CheckersGameOver(over) => {
                let winner = over.winner_side;
                match self.outcome() {
                    Some(outcome) if outcome.winner == winner => Ok(()),
                    Some(outcome) => Err(SyncError::Desync(GameError::InvalidMove(format!(
                        "peer reports {} won, local board says {}",
                        winner, outcome.winner
                    )))),
                    None => {
                        tracing::warn!(%winner, "Peer ended the game before the board did");
                        self.finish(Outcome { winner });
                        Ok(())
                    }
                }
            }
            other => Err(SyncError::UnexpectedMessage(other.kind())),
        }
    }

    fn apply_remote_move(&mut self, wire: &CheckersMove) -> Result<(), SyncError> {
        let remote = self.local.opposite();
        if self.outcome().is_some() {
            return Err(SyncError::Desync(GameError::InvalidMove("game is over".to_string())));
        }
        if wire.side != remote || self.to_move != remote {
            return Err(SyncError::Desync(GameError::WrongSide(wire.side)));
        }

        let mv = wire.to_move().map_err(SyncError::Desync)?;
        if let Some(at) = self.chain {
            if mv.from != at {
                return Err(SyncError::Desync(GameError::InvalidMove(format!(
                    "chain continues from {}, not {}",
                    at, mv.from
                ))));
            }
        }

        Rules::new(&self.board)
            .check_move(remote, &mv)
            .map_err(SyncError::Desync)?;
        let next = self.board.apply_move(&mv).map_err(SyncError::Desync)?;
        if wire.continues && !chain_continues(&next, remote, &mv) {
            return Err(SyncError::Desync(GameError::InvalidMove(format!(
                "{} cannot continue capturing",
                mv
            ))));
        }

        tracing::debug!(%mv, continues = wire.continues, "Applying peer move");
        self.record(remote, mv, next);
        if self.outcome().is_none() {
            if wire.continues {
                self.chain = Some(mv.to);
            } else {
                self.pass_turn(remote);
            }
        }
        Ok(())
    }

    /// Install `next`, the board after `side` played `mv`, and handle chains
    /// and turn handoff. Returns whether the same piece must capture again.
    fn commit(&mut self, side: Side, mv: Move, next: Board) -> bool {
        self.record(side, mv, next);
        if self.outcome().is_some() {
            return false;
        }

        if mv.is_capture() && has_further_capture(&self.board, side, mv.to) {
            tracing::debug!(%side, at = %mv.to, "Capture chain continues");
            self.chain = Some(mv.to);
            if side == self.local {
                let moves = legal_moves(&self.board, side, mv.to);
                self.phase = Phase::AwaitingDestination {
                    from: mv.to,
                    moves,
                    chained: true,
                };
            }
            return true;
        }

        self.pass_turn(side);
        false
    }

    /// Install `next` as the board after `side` played `mv`, checking for the end
    fn record(&mut self, side: Side, mv: Move, next: Board) {
        self.board = next;
        emit(&self.events_tx, GameEvent::MoveMade { mv, by: side });
        if let Some(at) = mv.captured {
            emit(
                &self.events_tx,
                GameEvent::PieceCaptured {
                    at,
                    owner: side.opposite(),
                },
            );
        }
        if let Some(outcome) = self.board.is_terminal() {
            self.finish(outcome);
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        tracing::info!(game_id = %self.game_id, winner = %outcome.winner, "Game over");
        self.chain = None;
        self.phase = Phase::Terminal(outcome);
        emit(&self.events_tx, GameEvent::GameEnded { winner: outcome.winner });
    }

    fn pass_turn(&mut self, from: Side) {
        self.chain = None;
        self.to_move = from.opposite();
        self.phase = self.idle_phase();
        emit(&self.events_tx, GameEvent::TurnPassed { to: self.to_move });
    }

    fn idle_phase(&self) -> Phase {
        if self.to_move == self.local && self.handshake.is_accepted() {
            Phase::AwaitingSelection
        } else {
            Phase::AwaitingOpponent
        }
    }

    /// Hand `msg` to the peer; its sequence number is spent only on success
    fn send(&mut self, msg: SyncMessage) -> Result<(), SyncError> {
        if let Opponent::Remote(messenger) = &self.opponent {
            tracing::debug!(kind = %msg.kind(), seq = msg.sequence(), "Sending sync message");
            messenger.send(msg)?;
            self.outbound.advance();
        }
        Ok(())
    }
}

/// Whether `side` must keep capturing after `mv` produced `next`
fn chain_continues(next: &Board, side: Side, mv: &Move) -> bool {
    next.is_terminal().is_none() && mv.is_capture() && has_further_capture(next, side, mv.to)
}

/// One move from `policy`, restricted to continuing captures when chained
fn pick(policy: &mut dyn MovePolicy, board: &Board, side: Side, chain: Option<Coord>) -> Option<Move> {
    match chain {
        Some(at) => {
            let captures: Vec<Move> = legal_moves(board, side, at)
                .into_iter()
                .filter(Move::is_capture)
                .collect();
            policy.select(&captures)
        }
        None => policy.choose_move(board, side),
    }
}
