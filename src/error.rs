//! Service error types with HTTP status code mapping.
//!
//! [`CounterError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "invalid identifier: \"; DROP TABLE x\"",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the code table on [`CounterError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 3001–3999 | Server          | 500 / 503                  |
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A view or column name failed the identifier allow-list.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Database round-trip failed.
    #[error("database error: {0}")]
    Database(String),

    /// The connection pool was shut down while waiting for a connection.
    #[error("connection pool is closed")]
    PoolClosed,

    /// Message broker client failure.
    #[error("broker error: {0}")]
    Broker(String),

    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CounterError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidIdentifier(_) => 1002,
            Self::Database(_) => 3001,
            Self::PoolClosed => 3002,
            Self::Broker(_) => 3003,
            Self::Config(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Broker(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CounterError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for CounterError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("migration failed: {err}"))
    }
}

impl From<rumqttc::ClientError> for CounterError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Broker(err.to_string())
    }
}

impl IntoResponse for CounterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        let err = CounterError::InvalidIdentifier("; DROP TABLE x".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1002);
        assert!(err.to_string().contains("DROP TABLE"));
    }

    #[test]
    fn database_errors_are_unavailable() {
        let err = CounterError::from(sqlx::Error::PoolClosed);
        assert!(matches!(err, CounterError::Database(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rejected_client_requests_are_broker_errors() {
        let options = rumqttc::MqttOptions::new("error-test", "127.0.0.1", 1883);
        let (client, eventloop) = rumqttc::AsyncClient::new(options, 1);
        drop(eventloop);
        let Err(e) = client.try_subscribe("t", rumqttc::QoS::AtMostOnce) else {
            panic!("subscribe without an event loop must fail");
        };
        let err = CounterError::from(e);
        assert!(matches!(err, CounterError::Broker(_)));
        assert_eq!(err.error_code(), 3003);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn into_response_sets_status() {
        let response = CounterError::PoolClosed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
