//! Refresh-cycle counters.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics.
pub struct IngestionMetrics {
    /// Refresh cycles started.
    pub cycles_total: AtomicU64,
    /// Cycles whose fetch succeeded.
    pub cycles_succeeded: AtomicU64,
    /// Cycles skipped because the fetch failed or timed out.
    pub cycles_failed: AtomicU64,
    /// Quotes written to the store.
    pub quotes_written: AtomicU64,
    /// Quotes dropped for violating the positive-rate invariant.
    pub quotes_rejected: AtomicU64,
    /// Individual upserts that failed.
    pub write_failures: AtomicU64,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl IngestionMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycles_succeeded: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            quotes_written: AtomicU64::new(0),
            quotes_rejected: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            last_success: RwLock::new(None),
        }
    }

    pub fn cycle_started(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed cycle and its write counts.
    pub fn cycle_succeeded(&self, written: usize, rejected: usize, write_failures: usize) {
        self.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
        self.quotes_written.fetch_add(written as u64, Ordering::Relaxed);
        self.quotes_rejected.fetch_add(rejected as u64, Ordering::Relaxed);
        self.write_failures
            .fetch_add(write_failures as u64, Ordering::Relaxed);
        if written > 0 {
            *self.last_success.write() = Some(Utc::now());
        }
    }

    /// When quotes were last written, if ever.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> IngestionMetricsSnapshot {
        IngestionMetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_succeeded: self.cycles_succeeded.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            quotes_written: self.quotes_written.load(Ordering::Relaxed),
            quotes_rejected: self.quotes_rejected.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            last_success: self.last_success(),
        }
    }
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time ingestion metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionMetricsSnapshot {
    pub cycles_total: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub quotes_written: u64,
    pub quotes_rejected: u64,
    pub write_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}
