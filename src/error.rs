//! Crate-wide error types, one per layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::model::api::ErrorResponse;

/// Configuration load/validation failures. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A single collection tick's failure. Logged and discarded, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("{0} collector already started")]
    AlreadyStarted(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// No collaborator is available yet to serve the call -- e.g. a scan
    /// trigger arriving before any path scanner has been started. Distinct
    /// from `Other` so HTTP handlers can map it to 501 instead of 500.
    #[error("{0}")]
    NotConfigured(String),
    #[error("{0}")]
    Other(String),
}

/// Embedded-store failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("pool error: {0}")]
    Pool(String),
}

/// HTTP-handler-level errors, mapped to JSON error bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Internal(String),
}

impl From<CollectorError> for ApiError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::NotConfigured(msg) => ApiError::NotImplemented(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone()),
            ApiError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Config(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        (status, Json(ErrorResponse { error: message, code: None, details: None })).into_response()
    }
}
