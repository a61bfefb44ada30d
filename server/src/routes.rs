//! HTTP routes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use pivotrate_common::{Currency, CurrencyKey};
use pivotrate_fx::parse_quantity;

use crate::error::ApiError;
use crate::service::RateService;

type SharedService = Arc<RateService>;

/// Build the application router.
pub fn router(service: SharedService, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes())
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}

fn api_routes() -> Router<SharedService> {
    Router::new()
        .route("/rate", get(exchange_rate))
        .route("/exchange-rate", get(exchange_rate))
        .route("/rates", get(rates))
        .route("/convert", get(convert))
        .route("/convertMultiple", get(convert_multiple))
        .route("/convert-multiple", get(convert_multiple))
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    from: Option<String>,
    to: Option<String>,
    qty: Option<String>,
}

/// Decimal written as a JSON number with every digit kept.
#[derive(Debug, Serialize)]
#[serde(transparent)]
struct JsonDecimal(#[serde(with = "rust_decimal::serde::arbitrary_precision")] Decimal);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRateBody {
    exchange_rate: JsonDecimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversionBody {
    conversion_result: JsonDecimal,
}

fn json_map<K: Ord>(values: BTreeMap<K, Decimal>) -> BTreeMap<K, JsonDecimal> {
    values
        .into_iter()
        .map(|(key, value)| (key, JsonDecimal(value)))
        .collect()
}

async fn health(State(service): State<SharedService>) -> Response {
    let report = service.health();
    let status = if report.state.accepts_requests() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn metrics(State(service): State<SharedService>) -> Response {
    (StatusCode::OK, Json(service.metrics())).into_response()
}

async fn exchange_rate(
    State(service): State<SharedService>,
    Query(params): Query<QueryParams>,
) -> Response {
    let result = lookup_rate(&service, params).await;
    respond(&service, result)
}

async fn rates(
    State(service): State<SharedService>,
    Query(params): Query<QueryParams>,
) -> Response {
    let result = lookup_rates(&service, params).await;
    respond(&service, result)
}

async fn convert(
    State(service): State<SharedService>,
    Query(params): Query<QueryParams>,
) -> Response {
    let result = convert_one(&service, params).await;
    respond(&service, result)
}

/// Targets come from repeated `to` parameters, comma-separated lists, or both.
async fn convert_multiple(
    State(service): State<SharedService>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let result = convert_targets(&service, params).await;
    respond(&service, result)
}

async fn lookup_rate(
    service: &RateService,
    params: QueryParams,
) -> Result<ExchangeRateBody, ApiError> {
    let from = required(params.from, "from")?;
    let to = required(params.to, "to")?;
    let rate = service.resolver().get_rate(&from, &to).await?;
    Ok(ExchangeRateBody {
        exchange_rate: JsonDecimal(rate),
    })
}

async fn lookup_rates(
    service: &RateService,
    params: QueryParams,
) -> Result<BTreeMap<CurrencyKey, JsonDecimal>, ApiError> {
    let from = required(params.from, "from")?;
    let table = service.resolver().get_rates(&from).await?;
    Ok(json_map(table))
}

async fn convert_one(
    service: &RateService,
    params: QueryParams,
) -> Result<ConversionBody, ApiError> {
    let from = required(params.from, "from")?;
    let to = required(params.to, "to")?;
    let quantity = parse_quantity(&required(params.qty, "qty")?)?;
    let converted = service.resolver().convert(&from, &to, quantity).await?;
    Ok(ConversionBody {
        conversion_result: JsonDecimal(converted),
    })
}

async fn convert_targets(
    service: &RateService,
    params: Vec<(String, String)>,
) -> Result<BTreeMap<Currency, JsonDecimal>, ApiError> {
    let mut from = None;
    let mut qty = None;
    let mut targets = Vec::new();

    for (name, value) in params {
        match name.as_str() {
            "from" => from = Some(value),
            "qty" => qty = Some(value),
            "to" | "to[]" => targets.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    let from = required(from, "from")?;
    if targets.is_empty() {
        return Err(ApiError::missing("to"));
    }
    let quantity = parse_quantity(&required(qty, "qty")?)?;

    let conversions = service
        .resolver()
        .convert_many(&from, &targets, quantity)
        .await?;
    Ok(json_map(conversions))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::missing(name))
}

fn respond<T: Serialize>(service: &RateService, result: Result<T, ApiError>) -> Response {
    let metrics = service.query_metrics();
    match result {
        Ok(body) => {
            metrics.query_succeeded();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                metrics.client_error();
            } else {
                error!(kind = e.kind(), error = %e, "Query failed");
                metrics.server_error();
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use pivotrate_common::{CurrencyKey, RateRecord};
    use pivotrate_fx::{FxError, FxResult, InMemoryRateStore, MockQuoteSource, RateStore};
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> (Router, SharedService) {
        let store = Arc::new(InMemoryRateStore::with_rates([
            ("USDEUR", dec!(0.92)),
            ("USDGBP", dec!(0.79)),
        ]));
        let service = Arc::new(RateService::new(
            ServerConfig::default(),
            store,
            Arc::new(MockQuoteSource::new()),
        ));
        (router(service.clone(), Duration::from_secs(5)), service)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_exchange_rate() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/rate?from=EUR&to=GBP").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exchangeRate"].to_string(), "0.858696");
    }

    #[tokio::test]
    async fn test_exchange_rate_alias_and_case() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/exchange-rate?from=usd&to=eur").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exchangeRate"].to_string(), "0.920000");
    }

    #[tokio::test]
    async fn test_unknown_currency_is_bad_request() {
        let (app, service) = app();
        let (status, body) = get_json(app, "/api/rate?from=JPY&to=USD").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "UNKNOWN_CURRENCY");
        assert!(body["message"].as_str().unwrap().contains("JPY"));
        assert_eq!(service.metrics().queries.client_errors, 1);
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/rate?from=EUR").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_rates_from_pivot_keep_stored_values() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/rates?from=USD").await;

        assert_eq!(status, StatusCode::OK);
        let table = body.as_object().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["USDEUR"].to_string(), "0.92");
        assert_eq!(table["USDGBP"].to_string(), "0.79");
    }

    #[tokio::test]
    async fn test_rates_from_base() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/rates?from=EUR").await;

        assert_eq!(status, StatusCode::OK);
        let table = body.as_object().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["EURGBP"].to_string(), "0.858696");
    }

    #[tokio::test]
    async fn test_convert() {
        let (app, service) = app();
        let (status, body) = get_json(app, "/api/convert?from=USD&to=EUR&qty=100").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversionResult"].to_string(), "92.000000");
        assert_eq!(service.metrics().queries.queries_total, 1);
    }

    #[tokio::test]
    async fn test_convert_rejects_bad_quantity() {
        let (app, _) = app();
        let (status, body) = get_json(app.clone(), "/api/convert?from=USD&to=EUR&qty=-5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_AMOUNT");

        let (status, body) = get_json(app, "/api/convert?from=USD&to=EUR&qty=lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_convert_multiple_repeated_and_comma_targets() {
        let (app, _) = app();
        let (status, body) = get_json(
            app,
            "/api/convertMultiple?from=EUR&to=GBP&to=USD,EUR&qty=10",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let results = body.as_object().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results["GBP"].to_string(), "8.586960");
        assert_eq!(results["EUR"].to_string(), "10");
    }

    #[tokio::test]
    async fn test_convert_multiple_fails_on_unknown_target() {
        let (app, _) = app();
        let (status, body) =
            get_json(app, "/api/convert-multiple?from=EUR&to=GBP,JPY&qty=10").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "UNKNOWN_CURRENCY");
    }

    #[tokio::test]
    async fn test_convert_multiple_requires_targets() {
        let (app, _) = app();
        let (status, body) = get_json(app, "/api/convertMultiple?from=EUR&qty=10").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "INVALID_REQUEST");
    }

    struct UnavailableStore;

    #[async_trait]
    impl RateStore for UnavailableStore {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn upsert(&self, _key: &CurrencyKey, _rate: Decimal) -> FxResult<()> {
            Err(FxError::StorageError("connection refused".to_string()))
        }

        async fn get(&self, _key: &CurrencyKey) -> FxResult<Option<RateRecord>> {
            Err(FxError::StorageError("connection refused".to_string()))
        }

        async fn list_all(&self) -> FxResult<Vec<RateRecord>> {
            Err(FxError::StorageError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let service = Arc::new(RateService::new(
            ServerConfig::default(),
            Arc::new(UnavailableStore),
            Arc::new(MockQuoteSource::new()),
        ));
        let app = router(service.clone(), Duration::from_secs(5));

        let (status, body) = get_json(app, "/api/rate?from=EUR&to=GBP").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "STORAGE_ERROR");
        assert_eq!(service.metrics().queries.server_errors, 1);
    }

    #[tokio::test]
    async fn test_out_of_range_rate_is_server_error() {
        let store = Arc::new(InMemoryRateStore::with_rates([
            ("USDBIG", Decimal::MAX),
            ("USDTINY", dec!(0.0000000001)),
        ]));
        let service = Arc::new(RateService::new(
            ServerConfig::default(),
            store,
            Arc::new(MockQuoteSource::new()),
        ));
        let app = router(service, Duration::from_secs(5));

        let (status, body) = get_json(app, "/api/rate?from=TINY&to=BIG").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["kind"], "RATE_OVERFLOW");
    }

    #[tokio::test]
    async fn test_health_reflects_lifecycle() {
        let (app, service) = app();

        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["state"], "starting");

        service.start().await.unwrap();
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "running");
        assert_eq!(body["pivot"], "USD");

        service.stop().await;
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = app();
        get_json(app.clone(), "/api/rate?from=EUR&to=GBP").await;

        let (status, body) = get_json(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queries"]["queries_total"], 1);
        assert_eq!(body["ingestion"]["cycles_total"], 0);
    }
}
