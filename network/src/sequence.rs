// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-peer sequence numbers
//!
//! Every message a peer sends carries the next number of its own counter.
//! The receiving side releases messages strictly in that order: anything
//! below the expected number was already applied and is dropped, anything
//! above it waits until the gap is filled.

use std::collections::BTreeMap;
use thiserror::Error;

/// Most out-of-order messages held while waiting for a gap to fill
pub const DEFAULT_DEDUP_WINDOW: usize = 8192;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The peer is too far ahead of what has been applied locally
    #[error("Sequence {seq} is too far ahead of {expected} (window {window})")]
    WindowExceeded { seq: u64, expected: u64, window: usize },
}

/// Releases inbound items in sequence order
#[derive(Debug)]
pub struct SequenceTracker<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
    window: usize,
    duplicates: u64,
}

impl<T> Default for SequenceTracker<T> {
    fn default() -> Self {
        Self::with_window(DEFAULT_DEDUP_WINDOW)
    }
}

impl<T> SequenceTracker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
            window: window.max(1),
            duplicates: 0,
        }
    }

    /// Offer `item` numbered `seq`, returning whatever is now ready in order
    pub fn accept(&mut self, seq: u64, item: T) -> Result<Vec<T>, SequenceError> {
        if seq < self.next || self.pending.contains_key(&seq) {
            self.duplicates += 1;
            tracing::debug!(seq, expected = self.next, "Dropping duplicate delivery");
            return Ok(Vec::new());
        }

        if seq > self.next {
            if seq - self.next > self.window as u64 || self.pending.len() >= self.window {
                return Err(SequenceError::WindowExceeded {
                    seq,
                    expected: self.next,
                    window: self.window,
                });
            }
            tracing::debug!(seq, expected = self.next, "Buffering out-of-order delivery");
            self.pending.insert(seq, item);
            return Ok(Vec::new());
        }

        let mut ready = vec![item];
        self.next += 1;
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        Ok(ready)
    }

    /// The number the next released item must carry
    pub fn next_expected(&self) -> u64 {
        self.next
    }

    /// Items waiting for a gap to fill
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliveries discarded as already seen
    pub fn duplicates_dropped(&self) -> u64 {
        self.duplicates
    }
}

/// Hands out this peer's outbound numbers.
///
/// A number is only used up by [`advance`](Self::advance), once the message
/// carrying it has been handed to the transport; a failed send reuses it.
#[derive(Debug, Default, Clone)]
pub struct OutboundSequence {
    next: u64,
}

impl OutboundSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number the next message will carry
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Use up the peeked number
    pub fn advance(&mut self) {
        self.next += 1;
    }

    /// Numbers handed out so far
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.accept(0, 'a').unwrap(), vec!['a']);
        assert_eq!(tracker.accept(1, 'b').unwrap(), vec!['b']);
        assert_eq!(tracker.next_expected(), 2);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut tracker = SequenceTracker::new();
        tracker.accept(0, 'a').unwrap();
        assert!(tracker.accept(0, 'a').unwrap().is_empty());

        tracker.accept(2, 'c').unwrap();
        assert!(tracker.accept(2, 'c').unwrap().is_empty());
        assert_eq!(tracker.duplicates_dropped(), 2);
    }

    #[test]
    fn test_gap_is_filled() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(2, 'c').unwrap().is_empty());
        assert!(tracker.accept(1, 'b').unwrap().is_empty());
        assert_eq!(tracker.pending_len(), 2);
        assert_eq!(tracker.accept(0, 'a').unwrap(), vec!['a', 'b', 'c']);
        assert_eq!(tracker.pending_len(), 0);
    }

    #[test]
    fn test_window_limit() {
        let mut tracker = SequenceTracker::with_window(4);
        assert!(tracker.accept(4, ()).is_ok());
        assert_eq!(
            tracker.accept(5, ()),
            Err(SequenceError::WindowExceeded {
                seq: 5,
                expected: 0,
                window: 4
            })
        );
    }

    #[test]
    fn test_outbound_counter() {
        let mut seq = OutboundSequence::new();
        assert_eq!(seq.peek(), 0);
        // Peeking alone does not use the number up
        assert_eq!(seq.peek(), 0);
        seq.advance();
        assert_eq!(seq.peek(), 1);
        seq.advance();
        assert_eq!(seq.issued(), 2);
    }
}
