//! PostgreSQL-backed rate store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pivotrate_common::{CurrencyKey, RateRecord};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::error::FxResult;
use crate::store::RateStore;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS exchange_rate (
    currency_key TEXT PRIMARY KEY,
    rate NUMERIC NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)";

const UPSERT: &str = "INSERT INTO exchange_rate (currency_key, rate, updated_at)
    VALUES ($1, $2, $3)
    ON CONFLICT (currency_key)
    DO UPDATE SET rate = EXCLUDED.rate, updated_at = EXCLUDED.updated_at";

const SELECT_ONE: &str =
    "SELECT currency_key, rate, updated_at FROM exchange_rate WHERE currency_key = $1";

const SELECT_ALL: &str = "SELECT currency_key, rate, updated_at FROM exchange_rate";

#[derive(Debug, sqlx::FromRow)]
struct RateRow {
    currency_key: String,
    rate: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<RateRow> for RateRecord {
    fn from(row: RateRow) -> Self {
        Self {
            currency_key: CurrencyKey::new(row.currency_key),
            rate: row.rate,
            updated_at: row.updated_at,
        }
    }
}

/// Rate store over a single `exchange_rate` table keyed by currency key.
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the table exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> FxResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `exchange_rate` table if it is missing.
    pub async fn ensure_schema(&self) -> FxResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!("Rate table ready");
        Ok(())
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn upsert(&self, key: &CurrencyKey, rate: Decimal) -> FxResult<()> {
        debug!(key = %key, rate = %rate, "Upserting rate");
        sqlx::query(UPSERT)
            .bind(key.as_str())
            .bind(rate)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &CurrencyKey) -> FxResult<Option<RateRecord>> {
        let row = sqlx::query_as::<_, RateRow>(SELECT_ONE)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RateRecord::from))
    }

    async fn list_all(&self) -> FxResult<Vec<RateRecord>> {
        let rows = sqlx::query_as::<_, RateRow>(SELECT_ALL)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(RateRecord::from).collect())
    }
}
