//! Crank service metrics.
//!
//! Provides atomic counters for monitoring crank operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the crank service.
#[derive(Debug)]
pub struct CrankMetrics {
    /// Ticks started.
    ticks: AtomicU64,

    /// Ticks abandoned because the snapshot slot was stale.
    stale_ticks: AtomicU64,

    /// Queue fetches that failed.
    fetch_failures: AtomicU64,

    /// Market queues that failed to decode.
    decode_failures: AtomicU64,

    /// Pending events observed across all queues.
    events_observed: AtomicU64,

    /// Settlement instructions built.
    instructions_built: AtomicU64,

    /// Instructions dropped because they fit no transaction.
    instructions_dropped: AtomicU64,

    /// Batches accepted by the ledger.
    batches_submitted: AtomicU64,

    /// Batches submitted at the priority fee.
    priority_batches: AtomicU64,

    /// Batches the ledger rejected.
    submission_failures: AtomicU64,

    /// Panics caught at the tick boundary.
    panics_caught: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for CrankMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CrankMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            stale_ticks: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            events_observed: AtomicU64::new(0),
            instructions_built: AtomicU64::new(0),
            instructions_dropped: AtomicU64::new(0),
            batches_submitted: AtomicU64::new(0),
            priority_batches: AtomicU64::new(0),
            submission_failures: AtomicU64::new(0),
            panics_caught: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a tick.
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a stale tick.
    pub fn record_stale_tick(&self) {
        self.stale_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed queue fetch.
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a queue that failed to decode.
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records pending events seen in a queue.
    pub fn record_events(&self, count: usize) {
        self.events_observed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Records built instructions.
    pub fn record_instructions(&self, count: usize) {
        self.instructions_built
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Records a dropped instruction.
    pub fn record_dropped(&self) {
        self.instructions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a submitted batch.
    pub fn record_submission(&self, priority: bool) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        if priority {
            self.priority_batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a rejected batch.
    pub fn record_submission_failure(&self) {
        self.submission_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a caught panic.
    pub fn record_panic(&self) {
        self.panics_caught.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns ticks started.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Returns stale ticks.
    #[must_use]
    pub fn stale_ticks(&self) -> u64 {
        self.stale_ticks.load(Ordering::Relaxed)
    }

    /// Returns failed fetches.
    #[must_use]
    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    /// Returns decode failures.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Returns events observed.
    #[must_use]
    pub fn events_observed(&self) -> u64 {
        self.events_observed.load(Ordering::Relaxed)
    }

    /// Returns instructions built.
    #[must_use]
    pub fn instructions_built(&self) -> u64 {
        self.instructions_built.load(Ordering::Relaxed)
    }

    /// Returns instructions dropped.
    #[must_use]
    pub fn instructions_dropped(&self) -> u64 {
        self.instructions_dropped.load(Ordering::Relaxed)
    }

    /// Returns batches submitted.
    #[must_use]
    pub fn batches_submitted(&self) -> u64 {
        self.batches_submitted.load(Ordering::Relaxed)
    }

    /// Returns priority batches.
    #[must_use]
    pub fn priority_batches(&self) -> u64 {
        self.priority_batches.load(Ordering::Relaxed)
    }

    /// Returns rejected batches.
    #[must_use]
    pub fn submission_failures(&self) -> u64 {
        self.submission_failures.load(Ordering::Relaxed)
    }

    /// Returns caught panics.
    #[must_use]
    pub fn panics_caught(&self) -> u64 {
        self.panics_caught.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the submission success rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let attempted = self.batches_submitted() + self.submission_failures();
        if attempted > 0 {
            self.batches_submitted() as f64 / attempted as f64
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> CrankMetricsSnapshot {
        CrankMetricsSnapshot {
            ticks: self.ticks(),
            stale_ticks: self.stale_ticks(),
            fetch_failures: self.fetch_failures(),
            decode_failures: self.decode_failures(),
            events_observed: self.events_observed(),
            instructions_built: self.instructions_built(),
            instructions_dropped: self.instructions_dropped(),
            batches_submitted: self.batches_submitted(),
            priority_batches: self.priority_batches(),
            submission_failures: self.submission_failures(),
            panics_caught: self.panics_caught(),
            uptime: self.uptime(),
            success_rate: self.success_rate(),
        }
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.stale_ticks.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.decode_failures.store(0, Ordering::Relaxed);
        self.events_observed.store(0, Ordering::Relaxed);
        self.instructions_built.store(0, Ordering::Relaxed);
        self.instructions_dropped.store(0, Ordering::Relaxed);
        self.batches_submitted.store(0, Ordering::Relaxed);
        self.priority_batches.store(0, Ordering::Relaxed);
        self.submission_failures.store(0, Ordering::Relaxed);
        self.panics_caught.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of crank metrics.
#[derive(Debug, Clone)]
pub struct CrankMetricsSnapshot {
    /// Ticks started.
    pub ticks: u64,
    /// Stale ticks.
    pub stale_ticks: u64,
    /// Failed fetches.
    pub fetch_failures: u64,
    /// Decode failures.
    pub decode_failures: u64,
    /// Events observed.
    pub events_observed: u64,
    /// Instructions built.
    pub instructions_built: u64,
    /// Instructions dropped.
    pub instructions_dropped: u64,
    /// Batches submitted.
    pub batches_submitted: u64,
    /// Priority batches.
    pub priority_batches: u64,
    /// Rejected batches.
    pub submission_failures: u64,
    /// Caught panics.
    pub panics_caught: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Success rate.
    pub success_rate: f64,
}
