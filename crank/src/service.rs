//! Main crank service.
//!
//! Orchestrates queue snapshotting, instruction planning, packing and
//! submission on a fixed interval. Ticks never overlap and never escape: any
//! error or panic raised by a tick is logged and the loop sleeps and runs
//! the next one. The only state carried between ticks is the slot gate and
//! the fee context cache.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::QueueCodec;
use crate::config::CrankConfig;
use crate::dedup::EventDeduplicator;
use crate::error::CrankError;
use crate::fee::{FeeContextReader, FeeContextRefresher};
use crate::ledger::LedgerClient;
use crate::market::MarketRegistry;
use crate::metrics::CrankMetrics;
use crate::planner::CrankBatchPlanner;
use crate::snapshot::{QueueSnapshotLoader, SlotGate};
use crate::submitter::TransactionSubmitter;
use crate::telemetry::{QueueDepthPoint, TelemetrySink};

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The snapshot slot was behind the gate; nothing was done.
    Stale,
    /// The tick ran to completion.
    Completed,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Representative slot of the snapshot.
    pub slot: u64,

    /// How the tick ended.
    pub outcome: TickOutcome,

    /// Markets whose queues were decoded.
    pub markets_observed: usize,

    /// Markets skipped (missing queue account or decode failure).
    pub markets_skipped: usize,

    /// Settlement instructions built.
    pub instructions_built: usize,

    /// Instructions dropped because they fit no transaction.
    pub instructions_dropped: usize,

    /// Batches accepted by the ledger.
    pub batches_submitted: usize,

    /// Batches the ledger rejected.
    pub batches_failed: usize,
}

impl TickReport {
    fn new(slot: u64, outcome: TickOutcome) -> Self {
        Self {
            slot,
            outcome,
            markets_observed: 0,
            markets_skipped: 0,
            instructions_built: 0,
            instructions_dropped: 0,
            batches_submitted: 0,
            batches_failed: 0,
        }
    }
}

/// The main crank service.
pub struct CrankService {
    /// Configuration.
    config: CrankConfig,

    /// Tracked markets.
    markets: MarketRegistry,

    /// Queue snapshot loader.
    loader: QueueSnapshotLoader,

    /// Queue decoder and deduplicator.
    dedup: EventDeduplicator,

    /// Instruction planner and packer.
    planner: CrankBatchPlanner,

    /// Transaction submitter.
    submitter: TransactionSubmitter,

    /// Telemetry output.
    telemetry: Arc<dyn TelemetrySink>,

    /// Metrics.
    metrics: Arc<CrankMetrics>,

    /// Minimum slot for the next snapshot.
    slot_gate: SlotGate,

    /// Whether the service is running.
    running: Arc<AtomicBool>,
}

impl CrankService {
    /// Creates a new crank service over already-loaded markets.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: CrankConfig,
        markets: MarketRegistry,
        ledger: Arc<dyn LedgerClient>,
        codec: Arc<dyn QueueCodec>,
        fees: FeeContextReader,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, CrankError> {
        config.validate()?;

        let metrics = Arc::new(CrankMetrics::new());
        let planner = CrankBatchPlanner::from_config(&config)?;

        Ok(Self {
            loader: QueueSnapshotLoader::new(Arc::clone(&ledger)),
            dedup: EventDeduplicator::new(codec),
            planner,
            submitter: TransactionSubmitter::with_metrics(ledger, fees, Arc::clone(&metrics)),
            telemetry,
            metrics,
            markets,
            config,
            slot_gate: SlotGate::new(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Validates the configuration, loads markets and starts the fee refresher.
    ///
    /// Returns the service and the refresher's task handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the markets cannot
    /// be loaded, or the first blockhash cannot be fetched.
    pub async fn start(
        config: CrankConfig,
        ledger: Arc<dyn LedgerClient>,
        codec: Arc<dyn QueueCodec>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<(Self, JoinHandle<()>), CrankError> {
        config.validate()?;

        let addresses = config.parse_markets()?;
        let markets = MarketRegistry::load(ledger.as_ref(), codec.as_ref(), &addresses).await?;

        let (fees, refresher) = FeeContextRefresher::start(
            Arc::clone(&ledger),
            Duration::from_millis(config.fee_refresh_interval_ms),
        )
        .await?;

        info!("Loaded markets: {}", config.markets.join(","));
        if config.debug {
            info!("DEBUG ENABLED");
        }

        let service = Self::new(config, markets, ledger, codec, fees, telemetry)?;
        Ok((service, refresher))
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<CrankMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CrankConfig {
        &self.config
    }

    /// Returns the current slot gate value.
    #[must_use]
    pub fn min_context_slot(&self) -> u64 {
        self.slot_gate.min_context_slot()
    }

    /// Returns true if the service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the service after the current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Crank service stop requested");
    }

    /// Runs the crank loop until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        self.running.store(true, Ordering::Relaxed);

        info!("Crank service started with {} markets", self.markets.len());

        let interval = Duration::from_millis(self.config.interval_ms);

        while self.is_running() {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }

        info!("Crank service stopped");
    }

    /// Runs one tick, containing any error or panic it raises.
    ///
    /// Returns the report if the tick completed.
    pub async fn tick(&self) -> Option<TickReport> {
        match AssertUnwindSafe(self.run_tick()).catch_unwind().await {
            Ok(Ok(report)) => {
                debug!(
                    slot = report.slot,
                    submitted = report.batches_submitted,
                    failed = report.batches_failed,
                    "Tick finished"
                );
                Some(report)
            }
            Ok(Err(err)) => {
                if matches!(err, CrankError::TransientFetch(_)) {
                    self.metrics.record_fetch_failure();
                }
                self.report_error(&err);
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.metrics.record_panic();
                self.telemetry
                    .record_error("panic", &format!("tick panicked: {message}"));
                None
            }
        }
    }

    /// Runs one tick, surfacing errors that abort it.
    ///
    /// Per-market decode failures, oversized instructions and rejected
    /// batches are contained inside the tick and only counted in the report.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::TransientFetch` if the queues cannot be read.
    pub async fn run_tick(&self) -> Result<TickReport, CrankError> {
        self.metrics.record_tick();

        let snapshot = self.loader.load(&self.markets).await?;
        if !self.slot_gate.admit(snapshot.slot) {
            self.metrics.record_stale_tick();
            if self.config.debug {
                info!("already processed slot {}, skipping...", snapshot.slot);
            } else {
                debug!("already processed slot {}, skipping...", snapshot.slot);
            }
            return Ok(TickReport::new(snapshot.slot, TickOutcome::Stale));
        }

        let mut report = TickReport::new(snapshot.slot, TickOutcome::Completed);
        let mut pending = Vec::new();

        for queue in snapshot.queues {
            let market = queue.market;

            let Some(data) = queue.data else {
                warn!(market = %market.address, "Event queue account not found");
                report.markets_skipped += 1;
                continue;
            };

            // Depth comes from the header, so it is recorded even when the
            // events themselves fail to decode.
            let events = match self.dedup.depth(&data) {
                Ok(depth) => {
                    self.metrics.record_events(depth);
                    self.telemetry
                        .record_queue_depth(&QueueDepthPoint::now(market.address, depth));
                    self.dedup.decode(&data)
                }
                Err(e) => Err(e),
            };

            let events = match events {
                Ok(events) => events,
                Err(source) => {
                    self.metrics.record_decode_failure();
                    self.report_error(&CrankError::Decode {
                        market: market.address,
                        source,
                    });
                    report.markets_skipped += 1;
                    continue;
                }
            };

            report.markets_observed += 1;

            if self.config.queue_only {
                continue;
            }

            match self.planner.plan_instruction(&market, &events) {
                Ok(Some(ix)) => {
                    info!(
                        market = %market.address,
                        priority = ix.priority,
                        "Creating consume events for {} events involving {} accounts",
                        ix.event_count,
                        ix.target_count()
                    );
                    pending.push(ix);
                }
                Ok(None) => {}
                Err(err) => {
                    self.report_error(&err);
                    report.markets_skipped += 1;
                }
            }
        }

        report.instructions_built = pending.len();
        self.metrics.record_instructions(pending.len());

        if pending.is_empty() && !self.config.queue_only {
            if self.config.debug {
                info!(slot = snapshot.slot, "No events to consume");
            } else {
                debug!(slot = snapshot.slot, "No events to consume");
            }
        }

        let packed = self.planner.pack(pending);
        for err in &packed.dropped {
            self.metrics.record_dropped();
            self.report_error(err);
        }
        report.instructions_dropped = packed.dropped.len();

        for batch in &packed.batches {
            match self.submitter.submit(batch).await {
                Ok(submission) => {
                    self.telemetry
                        .record_submission(submission.market_count, &submission.signature);
                    report.batches_submitted += 1;
                }
                Err(err) => {
                    self.report_error(&err);
                    report.batches_failed += 1;
                }
            }
        }

        Ok(report)
    }

    fn report_error(&self, err: &CrankError) {
        self.telemetry.record_error(err.stage(), &err.to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
