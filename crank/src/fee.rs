//! Fee context cache.
//!
//! The latest blockhash and its expiry height are refreshed on their own
//! timer, independent of crank ticks. The refresher task owns the only
//! sender of a `watch` channel; readers always see a whole value, either
//! the previous one or the new one.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::hash::Hash;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::CrankError;
use crate::ledger::LedgerClient;

/// Recent blockhash and the last block height at which it is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeContext {
    /// Recent blockhash.
    pub blockhash: Hash,

    /// Last block height at which `blockhash` is accepted.
    pub last_valid_block_height: u64,
}

impl FeeContext {
    /// Creates a fee context.
    #[must_use]
    pub const fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }
}

/// Read-only handle to the cached fee context.
#[derive(Debug, Clone)]
pub struct FeeContextReader {
    rx: watch::Receiver<FeeContext>,
}

impl FeeContextReader {
    /// Creates a reader pinned to a fixed value.
    #[must_use]
    pub fn fixed(context: FeeContext) -> Self {
        let (_tx, rx) = watch::channel(context);
        Self { rx }
    }

    /// Returns a copy of the current fee context.
    #[must_use]
    pub fn current(&self) -> FeeContext {
        self.rx.borrow().clone()
    }
}

/// Keeps the fee context fresh.
pub struct FeeContextRefresher;

impl FeeContextRefresher {
    /// Fetches the first fee context and spawns the refresh task.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::TransientFetch` if the first fetch fails.
    pub async fn start(
        ledger: Arc<dyn LedgerClient>,
        period: Duration,
    ) -> Result<(FeeContextReader, JoinHandle<()>), CrankError> {
        let initial = ledger
            .fetch_latest_checkpoint()
            .await
            .map_err(CrankError::TransientFetch)?;

        info!(blockhash = %initial.blockhash, "Loaded first blockhash");

        let (tx, rx) = watch::channel(initial);
        let handle = tokio::spawn(refresh_loop(ledger, tx, period));

        Ok((FeeContextReader { rx }, handle))
    }
}

async fn refresh_loop(
    ledger: Arc<dyn LedgerClient>,
    tx: watch::Sender<FeeContext>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial value is already set.
    interval.tick().await;

    loop {
        interval.tick().await;

        match ledger.fetch_latest_checkpoint().await {
            Ok(context) => {
                if tx.send(context).is_err() {
                    debug!("All fee context readers dropped, stopping refresh");
                    return;
                }
            }
            Err(e) => warn!("Couldn't get blockhash: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::testing::{blockhash, MockLedger};

    #[test]
    fn test_fixed_reader() {
        let reader = FeeContextReader::fixed(FeeContext::new(blockhash(9), 10));
        assert_eq!(reader.current(), FeeContext::new(blockhash(9), 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_updates_context() {
        let ledger = Arc::new(MockLedger::new());
        let (reader, handle) = FeeContextRefresher::start(ledger.clone(), Duration::from_secs(1))
            .await
            .expect("start");

        assert_eq!(reader.current().blockhash, blockhash(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(reader.current().blockhash, blockhash(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(reader.current().blockhash, blockhash(3));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_keeps_previous_on_failure() {
        let ledger = Arc::new(MockLedger::new());
        let (reader, handle) = FeeContextRefresher::start(ledger.clone(), Duration::from_secs(1))
            .await
            .expect("start");

        ledger.fail_next_checkpoint(LedgerError::Rpc("unavailable".to_string()));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(reader.current().blockhash, blockhash(1));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(reader.current().blockhash, blockhash(2));

        handle.abort();
    }

    #[tokio::test]
    async fn test_refresher_start_fails_without_checkpoint() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_next_checkpoint(LedgerError::Rpc("unavailable".to_string()));

        let result = FeeContextRefresher::start(ledger, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CrankError::TransientFetch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_stops_when_readers_dropped() {
        let ledger = Arc::new(MockLedger::new());
        let (reader, handle) = FeeContextRefresher::start(ledger, Duration::from_secs(1))
            .await
            .expect("start");

        drop(reader);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(handle.await.is_ok());
    }
}
