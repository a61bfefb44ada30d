//! Rate store contract and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use pivotrate_common::{CurrencyKey, RateRecord};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::error::FxResult;

/// Keyed storage of pivot-relative rates.
///
/// Each key is independent: no multi-key atomicity is offered, and readers may
/// observe records written by different refresh cycles.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Get the store name.
    fn name(&self) -> &str;

    /// Create or replace the record for `key`.
    async fn upsert(&self, key: &CurrencyKey, rate: Decimal) -> FxResult<()>;

    /// Point lookup. A missing record is `Ok(None)`.
    async fn get(&self, key: &CurrencyKey) -> FxResult<Option<RateRecord>>;

    /// Every stored record, in no particular order.
    async fn list_all(&self) -> FxResult<Vec<RateRecord>>;
}

/// Shared rate store.
pub type SharedRateStore = Arc<dyn RateStore>;

/// Thread-safe in-memory rate store.
pub struct InMemoryRateStore {
    records: DashMap<CurrencyKey, RateRecord>,
}

impl InMemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Create a store pre-populated with `(key, rate)` pairs.
    pub fn with_rates<K>(rates: impl IntoIterator<Item = (K, Decimal)>) -> Self
    where
        K: Into<String>,
    {
        let store = Self::new();
        for (key, rate) in rates {
            let key = CurrencyKey::new(key);
            store
                .records
                .insert(key.clone(), RateRecord::new(key, rate));
        }
        store
    }

    /// Get the number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryRateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, key: &CurrencyKey, rate: Decimal) -> FxResult<()> {
        debug!(key = %key, rate = %rate, "Upserting rate");
        self.records
            .insert(key.clone(), RateRecord::new(key.clone(), rate));
        Ok(())
    }

    async fn get(&self, key: &CurrencyKey) -> FxResult<Option<RateRecord>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn list_all(&self) -> FxResult<Vec<RateRecord>> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
