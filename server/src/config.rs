//! Service configuration.

use std::time::Duration;

use pivotrate_common::Currency;
use pivotrate_fx::{IngestorConfig, ProviderConfig};

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Database URL. Rates are kept in memory when unset.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub max_db_connections: u32,
    /// Upper bound on handling one HTTP request.
    pub request_timeout: Duration,
    /// Refresh scheduling and pivot.
    pub ingestor: IngestorConfig,
    /// Quote provider endpoint and credential.
    pub provider: ProviderConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            database_url: None,
            max_db_connections: 5,
            request_timeout: Duration::from_secs(10),
            ingestor: IngestorConfig::default(),
            provider: ProviderConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("PIVOTRATE_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("PIVOTRATE_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database_url = Some(url);
        }

        if let Some(pivot) = lookup("PIVOTRATE_PIVOT") {
            config.ingestor.pivot = Currency::new(pivot);
        }

        if let Some(secs) = lookup("PIVOTRATE_REFRESH_SECS").and_then(|s| s.parse().ok()) {
            config.ingestor.refresh_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = lookup("PIVOTRATE_FETCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.ingestor.fetch_timeout = Duration::from_secs(secs);
            config.provider.timeout = Duration::from_secs(secs);
        }

        if let Some(url) = lookup("PIVOTRATE_PROVIDER_URL") {
            config.provider.endpoint = url;
        }

        if let Some(key) = lookup("PIVOTRATE_ACCESS_KEY") {
            config.provider.access_key = key;
        }

        if let Some(secs) = lookup("PIVOTRATE_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// The pivot currency.
    pub fn pivot(&self) -> &Currency {
        &self.ingestor.pivot
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.max_db_connections == 0 {
            return Err("Database pool needs at least one connection".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be 0".to_string());
        }

        self.ingestor.validate()?;
        self.provider.validate()?;

        Ok(())
    }
}
