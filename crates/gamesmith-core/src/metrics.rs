//! Global atomic counters for the validation pipeline.
//!
//! Counters are bumped silently at the call site. [`Metrics::flush`] emits the
//! current values as a single `tracing::info!` event; the CLI calls it when a
//! command finishes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    checks_run: AtomicU64,
    repairs_attempted: AtomicU64,
    repairs_empty: AtomicU64,
    probes_run: AtomicU64,
    llm_calls: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            checks_run: AtomicU64::new(0),
            repairs_attempted: AtomicU64::new(0),
            repairs_empty: AtomicU64::new(0),
            probes_run: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
        }
    }

    pub fn inc_checks(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_run", "counter incremented");
    }

    pub fn inc_repairs(&self) {
        self.repairs_attempted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repairs_attempted", "counter incremented");
    }

    /// A repair whose response held no extractable code.
    pub fn inc_empty_repairs(&self) {
        self.repairs_empty.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repairs_empty", "counter incremented");
    }

    pub fn inc_probes(&self) {
        self.probes_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_run", "counter incremented");
    }

    pub fn inc_llm_calls(&self) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "llm_calls", "counter incremented");
    }

    /// Emit all current counter values as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            checks_run = self.checks_run(),
            repairs_attempted = self.repairs_attempted(),
            repairs_empty = self.repairs_empty(),
            probes_run = self.probes_run(),
            llm_calls = self.llm_calls(),
        );
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    pub fn repairs_attempted(&self) -> u64 {
        self.repairs_attempted.load(Ordering::Relaxed)
    }

    pub fn repairs_empty(&self) -> u64 {
        self.repairs_empty.load(Ordering::Relaxed)
    }

    pub fn probes_run(&self) -> u64 {
        self.probes_run.load(Ordering::Relaxed)
    }

    pub fn llm_calls(&self) -> u64 {
        self.llm_calls.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (tests).
    pub fn reset(&self) {
        self.checks_run.store(0, Ordering::Relaxed);
        self.repairs_attempted.store(0, Ordering::Relaxed);
        self.repairs_empty.store(0, Ordering::Relaxed);
        self.probes_run.store(0, Ordering::Relaxed);
        self.llm_calls.store(0, Ordering::Relaxed);
    }
}
