//! Quote source trait and the HTTP provider implementation.

use async_trait::async_trait;
use pivotrate_common::{Currency, CurrencyKey};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{FxError, FxResult};

const DEFAULT_ENDPOINT: &str = "http://api.exchangerate.host/live";

/// Pivot-relative quotes returned by one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSet {
    /// Pivot the provider says the quotes are relative to, if it reports one.
    pub source: Option<Currency>,
    /// Provider keys as given, with their quoted rates.
    pub quotes: Vec<(CurrencyKey, Decimal)>,
}

impl QuoteSet {
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Trait for external quote providers.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the latest quote set. Any failure is an [`FxError::IngestionFailure`].
    async fn fetch_quotes(&self) -> FxResult<QuoteSet>;
}

/// Configuration for the HTTP quote provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Live-quotes endpoint.
    pub endpoint: String,
    /// Access credential, sent as the `access_key` query parameter.
    pub access_key: String,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("Provider endpoint cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Provider timeout cannot be 0".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LiveResponse {
    success: Option<bool>,
    source: Option<String>,
    quotes: Option<BTreeMap<String, Decimal>>,
    error: Option<serde_json::Value>,
}

impl LiveResponse {
    fn into_quote_set(self) -> FxResult<QuoteSet> {
        if self.success == Some(false) {
            let detail = self
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(FxError::IngestionFailure(format!(
                "provider reported failure: {}",
                detail
            )));
        }

        let quotes = self.quotes.ok_or_else(|| {
            FxError::IngestionFailure("payload has no quotes".to_string())
        })?;

        if quotes.is_empty() {
            return Err(FxError::IngestionFailure("payload has an empty quote set".to_string()));
        }

        Ok(QuoteSet {
            source: self.source.map(Currency::new),
            quotes: quotes
                .into_iter()
                .map(|(key, rate)| (CurrencyKey::new(key), rate))
                .collect(),
        })
    }
}

/// Quote source backed by an exchangerate.host style `live` endpoint.
pub struct HttpQuoteSource {
    client: Client,
    config: ProviderConfig,
}

impl HttpQuoteSource {
    /// Create a new HTTP quote source.
    pub fn new(config: ProviderConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FxError::IngestionFailure(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &str {
        "exchangerate.host"
    }

    async fn fetch_quotes(&self) -> FxResult<QuoteSet> {
        let mut request = self.client.get(&self.config.endpoint);
        if !self.config.access_key.is_empty() {
            request = request.query(&[("access_key", self.config.access_key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FxError::IngestionFailure(format!(
                "provider returned HTTP {}",
                status
            )));
        }

        let body = response.bytes().await?;
        let payload: LiveResponse = serde_json::from_slice(&body)
            .map_err(|e| FxError::IngestionFailure(format!("malformed payload: {}", e)))?;

        let quote_set = payload.into_quote_set()?;
        debug!(count = quote_set.len(), "Fetched quotes from provider");
        Ok(quote_set)
    }
}

#[cfg(any(test, feature = "test-utils"))]
enum MockResponse {
    Quotes(QuoteSet),
    Failure(String),
}

/// Mock quote source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockQuoteSource {
    response: parking_lot::Mutex<MockResponse>,
    delay: parking_lot::Mutex<Option<Duration>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockQuoteSource {
    /// Create a mock that returns an empty quote set.
    pub fn new() -> Self {
        Self {
            response: parking_lot::Mutex::new(MockResponse::Quotes(QuoteSet::default())),
            delay: parking_lot::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Return these quotes on every fetch.
    pub fn set_quotes(&self, source: Option<&str>, quotes: &[(&str, Decimal)]) {
        let quote_set = QuoteSet {
            source: source.map(Currency::new),
            quotes: quotes
                .iter()
                .map(|(key, rate)| (CurrencyKey::from(*key), *rate))
                .collect(),
        };
        *self.response.lock() = MockResponse::Quotes(quote_set);
    }

    /// Fail every fetch with this message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.response.lock() = MockResponse::Failure(message.into());
    }

    /// Sleep before answering each fetch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_quotes(&self) -> FxResult<QuoteSet> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match &*self.response.lock() {
            MockResponse::Quotes(quotes) => Ok(quotes.clone()),
            MockResponse::Failure(message) => Err(FxError::IngestionFailure(message.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use rust_decimal_macros::dec;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/live", addr)
    }

    fn source_for(endpoint: String) -> HttpQuoteSource {
        HttpQuoteSource::new(ProviderConfig {
            endpoint,
            access_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_quotes_exactly() {
        let router = Router::new().route(
            "/live",
            get(|| async {
                r#"{"success":true,"source":"USD","quotes":{"USDEUR":0.923451,"USDGBP":0.79}}"#
            }),
        );
        let source = source_for(serve(router).await);

        let quotes = source.fetch_quotes().await.unwrap();

        assert_eq!(quotes.source, Some(Currency::usd()));
        assert_eq!(
            quotes.quotes,
            vec![
                (CurrencyKey::from("USDEUR"), dec!(0.923451)),
                (CurrencyKey::from("USDGBP"), dec!(0.79)),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_access_key() {
        let router = Router::new().route(
            "/live",
            get(|axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
                if query.as_deref() == Some("access_key=test-key") {
                    (StatusCode::OK, r#"{"quotes":{"USDEUR":0.92}}"#)
                } else {
                    (StatusCode::UNAUTHORIZED, "{}")
                }
            }),
        );
        let source = source_for(serve(router).await);

        assert_eq!(source.fetch_quotes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let router = Router::new().route(
            "/live",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let source = source_for(serve(router).await);

        let result = source.fetch_quotes().await;

        assert!(matches!(result, Err(FxError::IngestionFailure(_))));
    }

    #[tokio::test]
    async fn test_fetch_provider_reported_failure() {
        let router = Router::new().route(
            "/live",
            get(|| async {
                r#"{"success":false,"error":{"code":101,"info":"invalid access key"}}"#
            }),
        );
        let source = source_for(serve(router).await);

        let err = source.fetch_quotes().await.unwrap_err();

        assert!(err.to_string().contains("invalid access key"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload() {
        let router = Router::new().route("/live", get(|| async { "not json" }));
        let source = source_for(serve(router).await);

        assert!(matches!(
            source.fetch_quotes().await,
            Err(FxError::IngestionFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockQuoteSource::new();
        source.set_quotes(Some("USD"), &[("USDEUR", dec!(0.92))]);

        let quotes = source.fetch_quotes().await.unwrap();
        assert_eq!(quotes.len(), 1);

        source.fail_with("offline");
        assert!(source.fetch_quotes().await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
