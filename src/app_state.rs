//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::{AggregationQueryService, HealthMonitor};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read queries for counts, series and dashboard targets.
    pub query_service: Arc<AggregationQueryService>,
    /// Database, broker and sensor status.
    pub health: HealthMonitor,
    /// Live feed for WebSocket clients.
    pub event_bus: EventBus,
}
