//! Tracked markets.
//!
//! Markets are loaded once at startup and never change for the lifetime of
//! the process.

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::codec::QueueCodec;
use crate::error::CrankError;
use crate::ledger::LedgerClient;

/// A market and its event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Market {
    /// Market address.
    pub address: Pubkey,

    /// Event queue address.
    pub event_queue: Pubkey,
}

impl Market {
    /// Creates a market.
    #[must_use]
    pub const fn new(address: Pubkey, event_queue: Pubkey) -> Self {
        Self {
            address,
            event_queue,
        }
    }
}

/// The ordered set of markets the crank tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketRegistry {
    markets: Vec<Market>,
}

impl MarketRegistry {
    /// Creates a registry from already-resolved markets.
    #[must_use]
    pub fn new(markets: Vec<Market>) -> Self {
        Self { markets }
    }

    /// Loads market accounts and resolves their event queues.
    ///
    /// All markets are read in one batched fetch.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::TransientFetch` if the read fails, and
    /// `CrankError::MarketLoad` if any market is missing or malformed.
    pub async fn load(
        ledger: &dyn LedgerClient,
        codec: &dyn QueueCodec,
        addresses: &[Pubkey],
    ) -> Result<Self, CrankError> {
        let accounts = ledger
            .fetch_accounts(addresses)
            .await
            .map_err(CrankError::TransientFetch)?;

        let mut markets = Vec::with_capacity(addresses.len());
        for (index, address) in addresses.iter().enumerate() {
            let data = accounts
                .get(index)
                .and_then(|account| account.data.as_deref())
                .ok_or_else(|| CrankError::MarketLoad {
                    market: *address,
                    reason: "market account not found".to_string(),
                })?;

            let event_queue =
                codec
                    .decode_event_queue(data)
                    .map_err(|e| CrankError::MarketLoad {
                        market: *address,
                        reason: e.to_string(),
                    })?;

            markets.push(Market::new(*address, event_queue));
        }

        info!("Loaded {} markets", markets.len());

        Ok(Self { markets })
    }

    /// Returns the number of markets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Returns true if no markets are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Iterates markets in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.iter()
    }

    /// Returns event queue addresses in configured order.
    #[must_use]
    pub fn event_queue_addresses(&self) -> Vec<Pubkey> {
        self.markets.iter().map(|m| m.event_queue).collect()
    }
}
