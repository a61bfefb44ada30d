//! PivotRate FX Engine
//!
//! Rates are stored only against a single pivot currency and every other pair
//! is derived from them on demand.
//!
//! # Features
//!
//! - Rate store contract with in-memory and PostgreSQL implementations
//! - Periodic ingestion from an external quote provider with bounded fetches
//! - Pair rates, full rate tables and single or multi-target conversion
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pivotrate_common::Currency;
//! use pivotrate_fx::{InMemoryRateStore, RateResolver};
//!
//! let store = Arc::new(InMemoryRateStore::new());
//! let resolver = RateResolver::new(store, Currency::usd());
//!
//! let rate = resolver.get_rate("EUR", "GBP").await?;
//! let amount = resolver.convert("USD", "EUR", dec!(100)).await?;
//! ```

pub mod conversion;
pub mod error;
pub mod ingestor;
pub mod metrics;
pub mod pg_store;
pub mod provider;
pub mod resolver;
pub mod store;

pub use conversion::parse_quantity;
pub use error::{FxError, FxResult};
pub use ingestor::{IngestorConfig, IngestorHandle, RateIngestor, RefreshReport};
pub use metrics::{IngestionMetrics, IngestionMetricsSnapshot};
pub use pg_store::PgRateStore;
pub use provider::{HttpQuoteSource, ProviderConfig, QuoteSet, QuoteSource};
pub use resolver::{Conversions, RateResolver, RateTable};
pub use store::{InMemoryRateStore, RateStore, SharedRateStore};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockQuoteSource;
