//! Crank error types.
//!
//! Every failure a tick can surface maps onto one [`CrankError`] variant.
//! None of them are fatal to the process: the crank loop logs them and
//! proceeds to the next tick.

use solana_sdk::pubkey::Pubkey;

use crate::codec::DecodeError;
use crate::config::ConfigError;
use crate::ledger::LedgerError;

/// Crank errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CrankError {
    /// Reading queues or checkpoints from the ledger failed.
    #[error("transient fetch error: {0}")]
    TransientFetch(#[source] LedgerError),

    /// A market's queue could not be decoded.
    #[error("decode error for market {market}: {source}")]
    Decode {
        /// Market whose queue failed to decode.
        market: Pubkey,
        /// Underlying codec error.
        #[source]
        source: DecodeError,
    },

    /// A single instruction does not fit in an empty transaction.
    #[error("instruction for market {market} needs {accounts} accounts, ceiling is {ceiling}")]
    PackingOverflow {
        /// Market of the oversized instruction.
        market: Pubkey,
        /// Distinct accounts the instruction references.
        accounts: usize,
        /// Per-transaction account ceiling.
        ceiling: usize,
    },

    /// An instruction or transaction message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The ledger rejected a transaction.
    #[error("submission error: {0}")]
    Submission(#[source] LedgerError),

    /// Market accounts could not be loaded at startup.
    #[error("failed to load market {market}: {reason}")]
    MarketLoad {
        /// Market that failed to load.
        market: Pubkey,
        /// Why it failed.
        reason: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CrankError {
    /// Returns the pipeline stage this error belongs to.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::TransientFetch(_) => "fetch",
            Self::Decode { .. } => "decode",
            Self::PackingOverflow { .. } => "packing",
            Self::Encode(_) => "encode",
            Self::Submission(_) => "submit",
            Self::MarketLoad { .. } => "market_load",
            Self::Config(_) => "config",
        }
    }
}
