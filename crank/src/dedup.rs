//! Settlement target deduplication.
//!
//! A settlement instruction needs every account referenced by the events it
//! consumes, but only once. Each account is kept at the position of its last
//! occurrence in the queue.

use std::collections::HashSet;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use crate::codec::{DecodeError, QueueCodec, QueueEvent};

/// Decodes queues and derives their settlement targets.
pub struct EventDeduplicator {
    codec: Arc<dyn QueueCodec>,
}

impl EventDeduplicator {
    /// Creates a deduplicator backed by `codec`.
    #[must_use]
    pub fn new(codec: Arc<dyn QueueCodec>) -> Self {
        Self { codec }
    }

    /// Decodes raw queue bytes into ordered events.
    ///
    /// # Errors
    ///
    /// Returns the codec error if any event is malformed.
    pub fn decode(&self, raw: &[u8]) -> Result<Vec<QueueEvent>, DecodeError> {
        self.codec.decode_events(raw)
    }

    /// Reads the queue depth from the header without decoding events.
    ///
    /// # Errors
    ///
    /// Returns the codec error if the header is unreadable.
    pub fn depth(&self, raw: &[u8]) -> Result<usize, DecodeError> {
        self.codec.queue_depth(raw)
    }

    /// Decodes a queue and returns its settlement targets.
    ///
    /// # Errors
    ///
    /// Returns the codec error if any event is malformed.
    pub fn targets(&self, raw: &[u8]) -> Result<Vec<Pubkey>, DecodeError> {
        Ok(settlement_targets(&self.decode(raw)?))
    }
}

/// Returns each referenced account once, in last-occurrence order.
///
/// `[Fill(A), Out(B), Fill(A)]` yields `[B, A]`.
#[must_use]
pub fn settlement_targets(events: &[QueueEvent]) -> Vec<Pubkey> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut targets: Vec<Pubkey> = events
        .iter()
        .rev()
        .map(QueueEvent::account)
        .filter(|account| seen.insert(**account))
        .copied()
        .collect();
    targets.reverse();
    targets
}
