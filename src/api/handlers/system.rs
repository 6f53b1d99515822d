//! System endpoints: service info, health, broker status, system logs.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{HealthResponse, LogsQuery, ServiceInfo};
use crate::app_state::AppState;
use crate::error::{CounterError, ErrorResponse};
use crate::persistence::{LogLevel, SystemLog};
use crate::service::BrokerStatus;

/// `GET /` — Service information.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    summary = "Service information",
    description = "Returns the service name, version and where the API docs live.",
    responses(
        (status = 200, description = "Service is online", body = ServiceInfo),
    )
)]
pub async fn root_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "online",
        docs_url: "/docs",
    })
}

/// `GET /health` — Database, broker and sensor status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Probes the database with a bounded `SELECT 1` and reports broker connectivity and the last known sensor state. Always answers 200; failures are reported in the body.",
    responses(
        (status = 200, description = "Health report", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.status().await;
    (StatusCode::OK, Json(HealthResponse::from(status)))
}

/// `GET /broker-status` — MQTT subscriber status.
#[utoipa::path(
    get,
    path = "/broker-status",
    tag = "System",
    summary = "Broker status",
    description = "Returns the broker connection state, subscribed topic, last sensor state and message counters.",
    responses(
        (status = 200, description = "Broker status", body = BrokerStatus),
    )
)]
pub async fn broker_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.broker_status())
}

/// `GET /logs` — Stored system log rows, newest first.
///
/// # Errors
///
/// Returns [`CounterError::InvalidRequest`] for an unknown level or a
/// limit above 500, or a database error.
#[utoipa::path(
    get,
    path = "/logs",
    tag = "System",
    summary = "System logs",
    description = "Returns rows of the `system_logs` table newest first, optionally filtered by level.",
    params(LogsQuery),
    responses(
        (status = 200, description = "Log rows", body = Vec<SystemLog>),
        (status = 400, description = "Unknown level or limit too large", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse),
    )
)]
pub async fn system_logs_handler(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<impl IntoResponse, CounterError> {
    let level = params
        .level
        .as_deref()
        .map(str::parse::<LogLevel>)
        .transpose()?;
    let logs = state.query_service.system_logs(params.limit, level).await?;
    Ok(Json(logs))
}

/// System routes mounted at the root level (not under /v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/broker-status", get(broker_status_handler))
        .route("/logs", get(system_logs_handler))
}
