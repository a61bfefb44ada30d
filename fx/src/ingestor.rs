//! Periodic refresh of the rate store from an external quote source.

use std::sync::Arc;
use std::time::Duration;

use pivotrate_common::{Currency, CurrencyKey};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::metrics::IngestionMetrics;
use crate::provider::{QuoteSet, QuoteSource};
use crate::store::RateStore;

/// Configuration for the rate ingestor.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Pivot every quote is expected to be relative to.
    pub pivot: Currency,
    /// Time between refresh cycles.
    pub refresh_interval: Duration,
    /// Upper bound on a single fetch, including the provider's own timeout.
    pub fetch_timeout: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            pivot: Currency::usd(),
            refresh_interval: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl IngestorConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.pivot.is_empty() {
            return Err("Pivot currency cannot be empty".to_string());
        }

        if !self.pivot.code().chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("Pivot currency '{}' must be alphabetic", self.pivot));
        }

        if self.refresh_interval.is_zero() {
            return Err("Refresh interval cannot be 0".to_string());
        }

        if self.fetch_timeout >= self.refresh_interval {
            return Err("Fetch timeout must be shorter than the refresh interval".to_string());
        }

        Ok(())
    }
}

/// Outcome of one successful refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Quotes upserted into the store.
    pub written: usize,
    /// Quotes dropped because their rate was not positive.
    pub rejected: usize,
    /// Upserts the store refused.
    pub failed_writes: usize,
}

/// Pulls quotes from one source and upserts them into the store.
pub struct RateIngestor {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn RateStore>,
    config: IngestorConfig,
    metrics: Arc<IngestionMetrics>,
}

impl RateIngestor {
    /// Create a new ingestor.
    pub fn new(
        source: Arc<dyn QuoteSource>,
        store: Arc<dyn RateStore>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Record into shared metrics instead of private ones.
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &IngestorConfig {
        &self.config
    }

    /// Run one refresh cycle.
    ///
    /// The whole quote set is fetched and checked before anything is written,
    /// so a failed fetch leaves the store untouched.
    #[instrument(skip(self), fields(source = self.source.name(), store = self.store.name()))]
    pub async fn refresh_once(&self) -> FxResult<RefreshReport> {
        self.metrics.cycle_started();

        let quotes = match self.fetch().await {
            Ok(quotes) => quotes,
            Err(e) => {
                self.metrics.cycle_failed();
                return Err(e);
            }
        };

        let (accepted, rejected) = match self.screen(quotes) {
            Ok(screened) => screened,
            Err(e) => {
                self.metrics.cycle_failed();
                return Err(e);
            }
        };

        let mut report = RefreshReport {
            rejected,
            ..Default::default()
        };

        for (key, rate) in accepted {
            match self.store.upsert(&key, rate).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to store rate");
                    report.failed_writes += 1;
                }
            }
        }

        self.metrics
            .cycle_succeeded(report.written, report.rejected, report.failed_writes);

        info!(
            written = report.written,
            rejected = report.rejected,
            failed_writes = report.failed_writes,
            "Refresh cycle completed"
        );

        Ok(report)
    }

    /// Refresh immediately, then every interval, until `shutdown_rx` fires or closes.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            pivot = %self.config.pivot,
            interval_secs = self.config.refresh_interval.as_secs(),
            "Rate ingestor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once().await {
                        error!(error = %e, "Refresh cycle skipped");
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        info!("Rate ingestor stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime and return a handle to stop it.
    pub fn spawn(self: Arc<Self>) -> IngestorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        IngestorHandle { shutdown_tx, join }
    }

    async fn fetch(&self) -> FxResult<QuoteSet> {
        match tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_quotes()).await {
            Ok(Ok(quotes)) => Ok(quotes),
            Ok(Err(FxError::IngestionFailure(reason))) => Err(FxError::IngestionFailure(reason)),
            Ok(Err(e)) => Err(FxError::IngestionFailure(e.to_string())),
            Err(_) => Err(FxError::IngestionFailure(format!(
                "fetch timed out after {:?}",
                self.config.fetch_timeout
            ))),
        }
    }

    /// Split a quote set into writable quotes and a count of rejected ones.
    fn screen(&self, quotes: QuoteSet) -> FxResult<(Vec<(CurrencyKey, Decimal)>, usize)> {
        if let Some(source) = &quotes.source {
            if source != &self.config.pivot {
                return Err(FxError::IngestionFailure(format!(
                    "quotes are relative to {}, expected {}",
                    source, self.config.pivot
                )));
            }
        }

        let mut accepted = Vec::with_capacity(quotes.len());
        let mut rejected = 0;
        for (key, rate) in quotes.quotes {
            if rate > Decimal::ZERO {
                accepted.push((key, rate));
            } else {
                warn!(key = %key, rate = %rate, "Rejecting non-positive quote");
                rejected += 1;
            }
        }

        Ok((accepted, rejected))
    }
}

/// Handle to a spawned ingestor task.
pub struct IngestorHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl IngestorHandle {
    /// Signal the task to stop and wait for it to finish its current cycle.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            error!(error = %e, "Rate ingestor task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
