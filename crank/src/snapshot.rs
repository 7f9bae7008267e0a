//! Queue snapshots and slot gating.
//!
//! All tracked event queues are read in one round-trip per tick. The slot of
//! the first queue in the batch stands for the whole read; a tick whose slot
//! is behind the [`SlotGate`] is abandoned so a lagging RPC node never makes
//! the crank redo work it already did.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::CrankError;
use crate::ledger::{LedgerClient, LedgerError};
use crate::market::{Market, MarketRegistry};

/// Raw state of one market's event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Market the queue belongs to.
    pub market: Market,

    /// Raw queue bytes, `None` if the account was not found.
    pub data: Option<Vec<u8>>,

    /// Slot at which this queue was read.
    pub context_slot: u64,
}

/// All queue snapshots taken in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSnapshot {
    /// Representative slot for the tick.
    pub slot: u64,

    /// Per-market snapshots in registry order.
    pub queues: Vec<QueueSnapshot>,
}

/// Reads all tracked event queues in one batch.
pub struct QueueSnapshotLoader {
    ledger: Arc<dyn LedgerClient>,
}

impl QueueSnapshotLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Fetches the current queue state of every market.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::TransientFetch` on RPC failure or a short read.
    pub async fn load(&self, markets: &MarketRegistry) -> Result<TickSnapshot, CrankError> {
        let addresses = markets.event_queue_addresses();
        let accounts = self
            .ledger
            .fetch_accounts(&addresses)
            .await
            .map_err(CrankError::TransientFetch)?;

        if accounts.len() != addresses.len() {
            return Err(CrankError::TransientFetch(LedgerError::Rpc(format!(
                "expected {} queue accounts, got {}",
                addresses.len(),
                accounts.len()
            ))));
        }

        let slot = accounts.first().map_or(0, |a| a.context_slot);
        let queues = markets
            .iter()
            .zip(accounts)
            .map(|(market, account)| QueueSnapshot {
                market: *market,
                data: account.data,
                context_slot: account.context_slot,
            })
            .collect();

        Ok(TickSnapshot { slot, queues })
    }
}

/// Minimum context slot a snapshot must reach to be processed.
///
/// Starts at 0 and only ever moves forward. The tick body is its only
/// writer.
#[derive(Debug, Default)]
pub struct SlotGate {
    min_context_slot: AtomicU64,
}

impl SlotGate {
    /// Creates a gate that admits any slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_context_slot: AtomicU64::new(0),
        }
    }

    /// Returns the current minimum slot.
    #[must_use]
    pub fn min_context_slot(&self) -> u64 {
        self.min_context_slot.load(Ordering::Acquire)
    }

    /// Returns true if a snapshot at `slot` would be admitted.
    #[must_use]
    pub fn would_admit(&self, slot: u64) -> bool {
        slot >= self.min_context_slot()
    }

    /// Admits a snapshot at `slot`, advancing the gate past it.
    ///
    /// Returns false without touching the gate if `slot` is stale.
    pub fn admit(&self, slot: u64) -> bool {
        if !self.would_admit(slot) {
            return false;
        }
        self.min_context_slot
            .fetch_max(slot.saturating_add(1), Ordering::AcqRel);
        true
    }
}
