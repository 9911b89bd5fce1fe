// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging collaborator used by the turn coordinators
//!
//! The coordinators only need to deliver a message and to be told when a
//! message of some kind arrives. Delivery, retry and reconnection belong to
//! the transport behind [`Messenger`].

use crate::messages::{EventKind, SyncMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised by a messaging transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The other end has gone away
    #[error("Link closed")]
    Closed,

    /// The message could not be put on the wire
    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Outbound half of the messaging collaborator
pub trait Messenger: Send {
    /// Deliver `msg` to the peer
    fn send(&self, msg: SyncMessage) -> Result<(), TransportError>;
}

/// Fans inbound messages out to per-kind subscribers
#[derive(Default)]
pub struct MessageRouter {
    subscribers: HashMap<EventKind, Vec<mpsc::UnboundedSender<SyncMessage>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get notified of every message of `kind`
    pub fn subscribe(&mut self, kind: EventKind) -> mpsc::UnboundedReceiver<SyncMessage> {
        self.subscribe_many(&[kind])
    }

    /// One receiver for several kinds, preserving arrival order across them
    pub fn subscribe_many(&mut self, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<SyncMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in kinds {
            self.subscribers.entry(*kind).or_default().push(tx.clone());
        }
        rx
    }

    /// Hand `msg` to every live subscriber of its kind, returning how many got it
    pub fn dispatch(&mut self, msg: SyncMessage) -> usize {
        let kind = msg.kind();
        let Some(subscribers) = self.subscribers.get_mut(&kind) else {
            tracing::debug!(%kind, "No subscriber for message");
            return 0;
        };

        subscribers.retain(|tx| !tx.is_closed());
        for tx in subscribers.iter() {
            // retain() above dropped closed receivers, a race here only loses this copy
            let _ = tx.send(msg.clone());
        }
        subscribers.len()
    }
}

/// Sending half of a [`LocalLink`]
#[derive(Clone)]
pub struct LinkSender {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl LinkSender {
    /// Push an already encoded frame, bypassing serialization
    pub fn send_raw(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl Messenger for LinkSender {
    fn send(&self, msg: SyncMessage) -> Result<(), TransportError> {
        let frame = msg
            .to_cbor()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        tracing::trace!(kind = %msg.kind(), seq = msg.sequence(), bytes = frame.len(), "Sending frame");
        self.send_raw(frame)
    }
}

/// Receiving half of a [`LocalLink`]
pub struct LinkReceiver {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl LinkReceiver {
    /// Wait for the next decodable message, `None` once the peer is gone
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            let frame = self.rx.recv().await?;
            if let Some(msg) = decode_frame(&frame) {
                return Some(msg);
            }
        }
    }

    /// Next decodable message if one is already queued
    pub fn try_recv(&mut self) -> Option<SyncMessage> {
        while let Ok(frame) = self.rx.try_recv() {
            if let Some(msg) = decode_frame(&frame) {
                return Some(msg);
            }
        }
        None
    }
}

fn decode_frame(frame: &[u8]) -> Option<SyncMessage> {
    match SyncMessage::from_cbor(frame) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::warn!(error = %e, bytes = frame.len(), "Dropping undecodable frame");
            None
        }
    }
}

/// In-process FIFO link standing in for the push channel
pub struct LocalLink {
    pub sender: LinkSender,
    pub receiver: LinkReceiver,
}

impl LocalLink {
    /// Two connected ends; what one sends the other receives
    pub fn pair() -> (LocalLink, LocalLink) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            LocalLink {
                sender: LinkSender { tx: a_tx },
                receiver: LinkReceiver { rx: b_rx },
            },
            LocalLink {
                sender: LinkSender { tx: b_tx },
                receiver: LinkReceiver { rx: a_rx },
            },
        )
    }

    pub fn into_split(self) -> (LinkSender, LinkReceiver) {
        (self.sender, self.receiver)
    }
}

/// Records every outbound message instead of delivering it
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<SyncMessage>>>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far
    pub fn messages(&self) -> Vec<SyncMessage> {
        self.lock().clone()
    }

    /// Remove and return everything sent so far
    pub fn take(&self) -> Vec<SyncMessage> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SyncMessage>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Messenger for MemoryOutbox {
    fn send(&self, msg: SyncMessage) -> Result<(), TransportError> {
        self.lock().push(msg);
        Ok(())
    }
}
