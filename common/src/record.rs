//! Stored rate records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyKey;

/// One quoted exchange rate: 1 unit of pivot expressed in the target currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Pivot-qualified key ("USDEUR").
    pub currency_key: CurrencyKey,
    /// Quoted rate. Always positive for records written by the ingestor.
    pub rate: Decimal,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl RateRecord {
    /// Create a record stamped with the current time.
    pub fn new(currency_key: CurrencyKey, rate: Decimal) -> Self {
        Self {
            currency_key,
            rate,
            updated_at: Utc::now(),
        }
    }

    /// Whether the rate can be used as a divisor.
    pub fn is_usable(&self) -> bool {
        self.rate > Decimal::ZERO
    }
}
