//! Count listing, statistics and generic series queries.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CountsQuery, SeriesQuery, SeriesResponse};
use crate::app_state::AppState;
use crate::error::{CounterError, ErrorResponse};
use crate::persistence::{AggregationView, CountEvent, CountStatistics};

/// `GET /v1/counts` — Raw counts, newest first.
///
/// # Errors
///
/// Returns [`CounterError`] when the database is unavailable.
#[utoipa::path(
    get,
    path = "/v1/counts",
    tag = "Counts",
    summary = "List counts",
    description = "Returns stored crossings newest first. `limit` is clamped to 1..=1000.",
    params(CountsQuery),
    responses(
        (status = 200, description = "Page of counts", body = Vec<CountEvent>),
        (status = 503, description = "Database unavailable", body = ErrorResponse),
    )
)]
pub async fn list_counts(
    State(state): State<AppState>,
    Query(params): Query<CountsQuery>,
) -> Result<impl IntoResponse, CounterError> {
    let counts = state
        .query_service
        .recent_counts(params.limit, params.offset)
        .await?;
    Ok(Json(counts))
}

/// `GET /v1/counts/statistics` — Totals and newest timestamp.
///
/// # Errors
///
/// Returns [`CounterError`] when the database is unavailable.
#[utoipa::path(
    get,
    path = "/v1/counts/statistics",
    tag = "Counts",
    summary = "Count statistics",
    description = "Total count, today's count and the newest count timestamp, read as three separate aggregates.",
    responses(
        (status = 200, description = "Statistics", body = CountStatistics),
        (status = 503, description = "Database unavailable", body = ErrorResponse),
    )
)]
pub async fn count_statistics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, CounterError> {
    Ok(Json(state.query_service.statistics().await?))
}

/// `GET /v1/series/{view}` — Datapoints of one aggregation view.
///
/// # Errors
///
/// Returns [`CounterError::InvalidIdentifier`] for names outside the
/// allow-list, [`CounterError::InvalidRequest`] for an oversized window,
/// or a database error.
#[utoipa::path(
    get,
    path = "/v1/series/{view}",
    tag = "Counts",
    summary = "Query a series",
    description = "Returns `[value, timestampMillis]` pairs ascending by time. View and column names are checked against a fixed allow-list before any SQL is built.",
    params(
        ("view" = String, Path, description = "hourly_counts, daily_counts, production_speed or recent_counts_24h"),
        SeriesQuery,
    ),
    responses(
        (status = 200, description = "Datapoint series", body = SeriesResponse),
        (status = 400, description = "Unknown view or column, or window too wide", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse),
    )
)]
pub async fn query_series(
    State(state): State<AppState>,
    Path(view): Path<String>,
    Query(params): Query<SeriesQuery>,
) -> Result<impl IntoResponse, CounterError> {
    let column = match params.column {
        Some(column) => column,
        None => AggregationView::from_view_name(&view)
            .ok_or_else(|| CounterError::InvalidIdentifier(view.clone()))?
            .default_column()
            .to_string(),
    };

    let datapoints = state
        .query_service
        .query(&view, &column, params.days)
        .await?;

    Ok(Json(SeriesResponse {
        view,
        column,
        days: params.days,
        datapoints,
    }))
}

/// Count routes, nested under `/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/counts", get(list_counts))
        .route("/counts/statistics", get(count_statistics))
        .route("/series/{view}", get(query_series))
}
