//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use pivotrate_fx::FxError;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required query parameter is missing or blank.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Fx(#[from] FxError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn missing(param: &str) -> Self {
        Self::InvalidRequest(format!("missing required parameter '{param}'"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Fx(e) => e.error_code(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        match self {
            ApiError::InvalidRequest(_) => true,
            ApiError::Fx(e) => e.is_client_error(),
        }
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
