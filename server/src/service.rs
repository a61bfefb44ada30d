//! Rate service lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, instrument, warn};

use pivotrate_common::Currency;
use pivotrate_fx::{
    FxResult, HttpQuoteSource, InMemoryRateStore, IngestionMetrics, IngestorHandle,
    PgRateStore, QuoteSource, RateIngestor, RateResolver, RateStore, RefreshReport,
};

use crate::config::ServerConfig;
use crate::metrics::{MetricsReport, QueryMetrics};
use crate::state::ServiceState;

/// Health summary returned by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: ServiceState,
    pub pivot: Currency,
    pub store: String,
    pub last_refresh: Option<DateTime<Utc>>,
    /// No successful refresh within two refresh intervals.
    pub stale: bool,
}

/// Owns the store, the resolver answering queries and the refresh task feeding them.
pub struct RateService {
    config: ServerConfig,
    state: Arc<RwLock<ServiceState>>,
    store: Arc<dyn RateStore>,
    resolver: Arc<RateResolver>,
    ingestor: Arc<RateIngestor>,
    ingestion_metrics: Arc<IngestionMetrics>,
    query_metrics: Arc<QueryMetrics>,
    ingestor_handle: Mutex<Option<IngestorHandle>>,
}

impl RateService {
    /// Create a service over an existing store and quote source.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn RateStore>,
        source: Arc<dyn QuoteSource>,
    ) -> Self {
        let ingestion_metrics = Arc::new(IngestionMetrics::new());
        let resolver = Arc::new(RateResolver::new(store.clone(), config.pivot().clone()));
        let ingestor = Arc::new(
            RateIngestor::new(source, store.clone(), config.ingestor.clone())
                .with_metrics(ingestion_metrics.clone()),
        );

        Self {
            config,
            state: Arc::new(RwLock::new(ServiceState::Starting)),
            store,
            resolver,
            ingestor,
            ingestion_metrics,
            query_metrics: Arc::new(QueryMetrics::new()),
            ingestor_handle: Mutex::new(None),
        }
    }

    /// Build the store and quote source the configuration asks for.
    ///
    /// PostgreSQL is used when `database_url` is set, otherwise rates live in memory
    /// and are lost on restart.
    pub async fn from_config(config: ServerConfig) -> FxResult<Self> {
        let store: Arc<dyn RateStore> = match &config.database_url {
            Some(url) => Arc::new(PgRateStore::connect(url, config.max_db_connections).await?),
            None => {
                warn!("DATABASE_URL not set, rates are kept in memory only");
                Arc::new(InMemoryRateStore::new())
            }
        };
        let source: Arc<dyn QuoteSource> = Arc::new(HttpQuoteSource::new(config.provider.clone())?);

        info!(
            store = store.name(),
            source = source.name(),
            pivot = %config.pivot(),
            "Rate service assembled"
        );

        Ok(Self::new(config, store, source))
    }

    /// Start answering queries and spawn the refresh task.
    #[instrument(skip(self), fields(pivot = %self.config.pivot()))]
    pub async fn start(&self) -> FxResult<()> {
        let mut handle = self.ingestor_handle.lock();
        if handle.is_some() {
            warn!("Rate service already started");
            return Ok(());
        }

        info!("Starting rate service");

        *handle = Some(self.ingestor.clone().spawn());
        *self.state.write() = ServiceState::Running;

        info!("Rate service started");
        Ok(())
    }

    /// Stop the refresh task and wait for its current cycle to finish.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        if self.state().is_terminal() {
            return;
        }

        info!("Stopping rate service");

        *self.state.write() = ServiceState::ShuttingDown;

        let handle = self.ingestor_handle.lock().take();
        if let Some(handle) = handle {
            handle.stop().await;
        }

        *self.state.write() = ServiceState::Stopped;

        info!("Rate service stopped");
    }

    /// Run one refresh cycle outside the schedule.
    pub async fn refresh_now(&self) -> FxResult<RefreshReport> {
        self.ingestor.refresh_once().await
    }

    pub fn resolver(&self) -> &RateResolver {
        &self.resolver
    }

    pub fn query_metrics(&self) -> &QueryMetrics {
        &self.query_metrics
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// Check if the service is accepting queries.
    pub fn is_accepting_requests(&self) -> bool {
        self.state().accepts_requests()
    }

    pub fn health(&self) -> HealthReport {
        let last_refresh = self.ingestion_metrics.last_success();
        let window = self
            .config
            .ingestor
            .refresh_interval
            .checked_mul(2)
            .and_then(|window| ChronoDuration::from_std(window).ok())
            .unwrap_or(ChronoDuration::MAX);
        let stale = match last_refresh {
            Some(at) => Utc::now().signed_duration_since(at) > window,
            None => true,
        };

        HealthReport {
            state: self.state(),
            pivot: self.config.pivot().clone(),
            store: self.store.name().to_string(),
            last_refresh,
            stale,
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        MetricsReport {
            queries: self.query_metrics.snapshot(),
            ingestion: self.ingestion_metrics.snapshot(),
        }
    }
}
