//! Currency codes and pivot-qualified storage keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency code, normalized to trimmed uppercase.
///
/// Codes are opaque: nothing checks them against an ISO registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Storage key for a rate record: the pivot code followed by the target code.
///
/// Keys coming from the provider are kept exactly as given, so a key is not
/// guaranteed to start with the configured pivot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyKey(String);

impl CurrencyKey {
    /// Wrap a raw key without any normalization.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the key under which `target` is quoted against `pivot`.
    pub fn qualify(pivot: &Currency, target: &Currency) -> Self {
        Self(format!("{}{}", pivot.code(), target.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Target currency of this key, if it is qualified by `pivot`.
    ///
    /// A key equal to the bare pivot code has no target.
    pub fn target(&self, pivot: &Currency) -> Option<Currency> {
        self.0
            .strip_prefix(pivot.code())
            .filter(|rest| !rest.is_empty())
            .map(Currency::new)
    }

    /// Replace the pivot prefix with another base code ("USDGBP" -> "EURGBP").
    pub fn rebase(&self, pivot: &Currency, base: &Currency) -> Option<Self> {
        self.target(pivot)
            .map(|target| Self::qualify(base, &target))
    }
}

impl fmt::Display for CurrencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
