//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Data endpoints are mounted under `/v1`; system endpoints sit at the
//! root. With the `swagger-ui` feature the OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/docs`.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "barrier-counter",
        description = "Light-barrier crossing counter: counts, statistics and dashboard series."
    ),
    paths(
        handlers::system::root_handler,
        handlers::system::health_handler,
        handlers::system::broker_status_handler,
        handlers::system::system_logs_handler,
        handlers::counts::list_counts,
        handlers::counts::count_statistics,
        handlers::counts::query_series,
        handlers::grafana::grafana_root,
        handlers::grafana::grafana_search,
        handlers::grafana::grafana_query,
    ),
    components(schemas(crate::error::ErrorResponse, crate::error::ErrorBody)),
    tags(
        (name = "System", description = "Service info, health, broker status and logs"),
        (name = "Counts", description = "Stored counts and aggregation series"),
        (name = "Grafana", description = "Simple-json datasource"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/docs")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the full application: REST routes, the `/ws` feed, and the
/// tracing, CORS and request-timeout layers.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router()
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/health",
            "/broker-status",
            "/logs",
            "/v1/counts",
            "/v1/counts/statistics",
            "/v1/series/{view}",
            "/v1/grafana",
            "/v1/grafana/search",
            "/v1/grafana/query",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
