//! Query counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use pivotrate_fx::IngestionMetricsSnapshot;

/// Query metrics.
pub struct QueryMetrics {
    /// Queries handled.
    pub queries_total: AtomicU64,
    /// Queries rejected for bad input or unknown currencies.
    pub client_errors: AtomicU64,
    /// Queries that failed on the service side.
    pub server_errors: AtomicU64,
}

impl QueryMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            queries_total: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
        }
    }

    pub fn query_succeeded(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_error(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn server_error(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        self.server_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> QueryMetricsSnapshot {
        QueryMetricsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time query metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetricsSnapshot {
    pub queries_total: u64,
    pub client_errors: u64,
    pub server_errors: u64,
}

/// Everything exposed on `/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub queries: QueryMetricsSnapshot,
    pub ingestion: IngestionMetricsSnapshot,
}
