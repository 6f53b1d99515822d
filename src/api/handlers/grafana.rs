//! Grafana simple-json datasource endpoints.
//!
//! Panels request targets by name; each name maps to a fixed view and
//! window, so nothing caller-supplied reaches SQL.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{GrafanaQueryRequest, GrafanaStatus};
use crate::app_state::AppState;
use crate::error::{CounterError, ErrorResponse};

/// `GET /v1/grafana` — Datasource connection test.
#[utoipa::path(
    get,
    path = "/v1/grafana",
    tag = "Grafana",
    summary = "Datasource test",
    responses(
        (status = 200, description = "Datasource reachable", body = GrafanaStatus),
    )
)]
pub async fn grafana_root() -> impl IntoResponse {
    Json(GrafanaStatus { status: "ok" })
}

/// `GET|POST /v1/grafana/search` — Available target names.
#[utoipa::path(
    post,
    path = "/v1/grafana/search",
    tag = "Grafana",
    summary = "List targets",
    description = "Returns every target name accepted by the query endpoint. Also answers GET.",
    responses(
        (status = 200, description = "Target names", body = Vec<String>),
    )
)]
pub async fn grafana_search(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.query_service.list_targets())
}

/// `POST /v1/grafana/query` — Render the requested targets.
///
/// # Errors
///
/// Returns [`CounterError`] when a backing query fails.
#[utoipa::path(
    post,
    path = "/v1/grafana/query",
    tag = "Grafana",
    summary = "Query targets",
    description = "Renders each requested target as a `{target, datapoints}` series or a table. Unknown targets are skipped.",
    request_body = GrafanaQueryRequest,
    responses(
        (status = 200, description = "One entry per known target", body = Vec<serde_json::Value>),
        (status = 503, description = "Database unavailable", body = ErrorResponse),
    )
)]
pub async fn grafana_query(
    State(state): State<AppState>,
    Json(req): Json<GrafanaQueryRequest>,
) -> Result<impl IntoResponse, CounterError> {
    let mut responses = Vec::with_capacity(req.targets.len());
    for name in req.targets.iter().filter_map(|t| t.target.as_deref()) {
        if let Some(response) = state.query_service.render_target(name).await? {
            responses.push(response);
        }
    }
    Ok(Json(responses))
}

/// Grafana routes, nested under `/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/grafana", get(grafana_root))
        .route("/grafana/search", get(grafana_search).post(grafana_search))
        .route("/grafana/query", post(grafana_query))
}
