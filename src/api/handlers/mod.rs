//! REST endpoint handlers organized by resource.

pub mod counts;
pub mod grafana;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(counts::routes())
        .merge(grafana::routes())
}
