//! PivotRate Server
//!
//! HTTP query service over the rate engine. Owns the refresh task that keeps
//! the store current and exposes pair rates, rate tables and conversions.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod service;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use service::RateService;
