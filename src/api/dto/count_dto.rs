//! Request and response shapes for the count endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::persistence::Datapoint;

/// Pagination for `GET /v1/counts`.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CountsQuery {
    /// Rows to return (1–1000). Defaults to 100.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Rows to skip, newest first. Defaults to 0.
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

/// Parameters of `GET /v1/series/{view}`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SeriesQuery {
    /// Value column; defaults to the view's primary column.
    pub column: Option<String>,
    /// Day window. Defaults to 30.
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

/// A resolved datapoint series.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeriesResponse {
    /// View the series was read from.
    pub view: String,
    /// Value column.
    pub column: String,
    /// Day window applied.
    pub days: u32,
    /// `[value, timestampMillis]` pairs, ascending by time.
    #[schema(value_type = Vec<Vec<f64>>)]
    pub datapoints: Vec<Datapoint>,
}
