//! Settle Crank - Service for draining market event queues.
//!
//! This crate provides the crank service that watches the event queues of a
//! set of markets and submits settlement (ConsumeEvents) transactions for
//! them. This is a permissionless service: settlement is idempotent and any
//! operator may run it.
//!
//! # Components
//!
//! - [`config`]: Crank configuration and its sources
//! - [`market`]: Market registry
//! - [`snapshot`]: Queue snapshots and the slot gate
//! - [`dedup`]: Settlement target deduplication
//! - [`builder`]: Settlement instruction building
//! - [`planner`]: Instruction planning and batch packing
//! - [`fee`]: Fee context cache
//! - [`submitter`]: Transaction submission
//! - [`service`]: Main crank service
//! - [`metrics`]: Crank metrics
//! - [`telemetry`]: Logging and queue depth telemetry

pub mod address;
pub mod builder;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fee;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod planner;
pub mod service;
pub mod snapshot;
pub mod submitter;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use address::{parse_address, parse_address_list, AddressError};
pub use builder::InstructionBuilder;
pub use codec::{DecodeError, QueueCodec, QueueEvent};
pub use config::{ConfigError, ConfigSource, CrankConfig, EnvConfigSource, JsonConfigSource};
pub use dedup::{settlement_targets, EventDeduplicator};
pub use error::CrankError;
pub use fee::{FeeContext, FeeContextReader, FeeContextRefresher};
pub use ledger::{FetchedAccount, LedgerClient, LedgerError};
pub use market::{Market, MarketRegistry};
pub use metrics::{CrankMetrics, CrankMetricsSnapshot};
pub use planner::{Batch, CrankBatchPlanner, CrankInstruction, FeeTier, PackResult};
pub use service::{CrankService, TickOutcome, TickReport};
pub use snapshot::{QueueSnapshot, QueueSnapshotLoader, SlotGate, TickSnapshot};
pub use submitter::{Submission, TransactionSubmitter};
pub use telemetry::{init_tracing, QueueDepthPoint, TelemetrySink, TracingTelemetry};
