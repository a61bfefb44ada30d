//! Rate engine error types.

use pivotrate_common::Currency;
use thiserror::Error;

/// Errors that can occur in the rate engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// Quantity is negative, non-numeric or too large to convert.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// No resolvable rate for the listed codes, none of which is the pivot.
    #[error("Unknown currency: {}", join_codes(.0))]
    UnknownCurrency(Vec<Currency>),

    /// Stored rates are too far apart for their ratio to be represented.
    #[error("Rate overflow: {0}")]
    RateOverflow(String),

    /// The rate store could not be read or written.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A refresh cycle could not fetch or parse the provider's quotes.
    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),
}

impl FxError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidAmount(_) => "INVALID_AMOUNT",
            FxError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            FxError::RateOverflow(_) => "RATE_OVERFLOW",
            FxError::StorageError(_) => "STORAGE_ERROR",
            FxError::IngestionFailure(_) => "INGESTION_FAILURE",
        }
    }

    /// Whether the caller is at fault (bad input) rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FxError::InvalidAmount(_) | FxError::UnknownCurrency(_)
        )
    }
}

impl From<sqlx::Error> for FxError {
    fn from(value: sqlx::Error) -> Self {
        Self::StorageError(value.to_string())
    }
}

impl From<reqwest::Error> for FxError {
    fn from(value: reqwest::Error) -> Self {
        Self::IngestionFailure(value.to_string())
    }
}

fn join_codes(codes: &[Currency]) -> String {
    codes
        .iter()
        .map(Currency::code)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for rate engine operations.
pub type FxResult<T> = Result<T, FxError>;
