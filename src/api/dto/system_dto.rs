//! Service info, health and system log shapes.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::service::HealthStatus;

/// Response of `GET /`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceInfo {
    /// Service name.
    pub name: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Always `"online"`.
    pub status: &'static str,
    /// Where the API docs are served.
    pub docs_url: &'static str,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` when the database and broker are both reachable.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Component details.
    #[serde(flatten)]
    pub detail: HealthStatus,
}

impl From<HealthStatus> for HealthResponse {
    fn from(detail: HealthStatus) -> Self {
        Self {
            status: if detail.is_healthy() { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            detail,
        }
    }
}

/// Parameters of `GET /logs`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    /// Rows to return (at most 500). Defaults to 100.
    #[serde(default = "default_log_limit")]
    pub limit: u32,
    /// Only rows of this level: INFO, WARNING or ERROR.
    pub level: Option<String>,
}

fn default_log_limit() -> u32 {
    100
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn status(database_reachable: bool, broker_connected: bool) -> HealthStatus {
        HealthStatus {
            database_reachable,
            broker_connected,
            last_known_sensor_state: "free".to_string(),
            sensor_updated_at: None,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn health_response_flattens_detail() {
        let Ok(json) = serde_json::to_value(HealthResponse::from(status(true, true))) else {
            panic!("serialization failed");
        };
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database_reachable"], true);
        assert_eq!(json["last_known_sensor_state"], "free");
    }

    #[test]
    fn any_component_down_is_unhealthy() {
        assert_eq!(HealthResponse::from(status(false, true)).status, "unhealthy");
        assert_eq!(HealthResponse::from(status(true, false)).status, "unhealthy");
    }

    #[test]
    fn logs_query_defaults() {
        let Ok(q) = serde_json::from_str::<LogsQuery>("{}") else {
            panic!("empty query must deserialize");
        };
        assert_eq!(q.limit, 100);
        assert!(q.level.is_none());
    }
}
