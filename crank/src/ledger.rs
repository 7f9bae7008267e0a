//! Ledger client interface.
//!
//! The crank never talks to the network directly. Everything it needs from
//! the ledger (batched account reads, the latest blockhash, signing and raw
//! submission) goes through [`LedgerClient`].

use async_trait::async_trait;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;

use crate::fee::FeeContext;

/// An account returned by a batched read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAccount {
    /// Raw account data, `None` if the account does not exist.
    pub data: Option<Vec<u8>>,

    /// Slot at which the read was served.
    pub context_slot: u64,
}

impl FetchedAccount {
    /// Creates an existing account read at `context_slot`.
    #[must_use]
    pub fn new(data: Vec<u8>, context_slot: u64) -> Self {
        Self {
            data: Some(data),
            context_slot,
        }
    }

    /// Creates a missing account read at `context_slot`.
    #[must_use]
    pub const fn missing(context_slot: u64) -> Self {
        Self {
            data: None,
            context_slot,
        }
    }
}

/// Ledger client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Network or RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The ledger rejected a raw transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The transaction could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Access to the shared ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Reads all `addresses` in one round-trip.
    ///
    /// The result has one entry per address, in the same order.
    async fn fetch_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<FetchedAccount>, LedgerError>;

    /// Returns the latest finalized blockhash and its expiry height.
    async fn fetch_latest_checkpoint(&self) -> Result<FeeContext, LedgerError>;

    /// Returns the fee payer every message is compiled against.
    fn payer(&self) -> Pubkey;

    /// Signs a compiled message with the fee payer.
    ///
    /// Returns the serialized signed transaction.
    fn sign(&self, message: &VersionedMessage) -> Result<Vec<u8>, LedgerError>;

    /// Submits signed bytes without waiting for confirmation.
    ///
    /// Returns the submission identifier (the transaction signature).
    async fn submit_raw(&self, signed: &[u8]) -> Result<String, LedgerError>;
}
