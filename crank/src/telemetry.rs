//! Telemetry output and tracing setup.
//!
//! The crank reports three kinds of records: a queue-depth point per market
//! per tick, a line per submitted batch, and a line per error. Where they go
//! is up to the [`TelemetrySink`]; [`TracingTelemetry`] writes them as
//! structured `tracing` events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::address::base58;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,settle_crank=debug";

/// Queue depth of one market observed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepthPoint {
    /// Market address.
    #[serde(with = "base58")]
    pub market: Pubkey,

    /// Number of pending events.
    pub depth: usize,

    /// Observation time.
    pub timestamp: DateTime<Utc>,
}

impl QueueDepthPoint {
    /// Creates a point stamped with the current time.
    #[must_use]
    pub fn now(market: Pubkey, depth: usize) -> Self {
        Self {
            market,
            depth,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for crank telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Records the queue depth of one market.
    fn record_queue_depth(&self, point: &QueueDepthPoint);

    /// Records a submitted batch.
    fn record_submission(&self, market_count: usize, submission_id: &str);

    /// Records an error at a pipeline stage.
    fn record_error(&self, stage: &str, message: &str);
}

/// Writes telemetry as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_queue_depth(&self, point: &QueueDepthPoint) {
        info!(
            target: "settle_crank::telemetry",
            market = %point.market,
            size = point.depth,
            timestamp = %point.timestamp.to_rfc3339(),
            "crank-queue"
        );
    }

    fn record_submission(&self, market_count: usize, submission_id: &str) {
        info!(
            target: "settle_crank::telemetry",
            market_count,
            submission_id,
            "Cranked {} market(s): {}",
            market_count,
            submission_id
        );
    }

    fn record_error(&self, stage: &str, message: &str) {
        error!(target: "settle_crank::telemetry", stage, "{}", message);
    }
}

/// Installs the global tracing subscriber.
///
/// Reads the filter from `RUST_LOG`, falling back to `default_filter`.
/// Returns false if a subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
