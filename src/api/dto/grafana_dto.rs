//! Grafana simple-json datasource bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /v1/grafana/query`.
///
/// Grafana sends many more fields (range, interval, format); only the
/// targets are read.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GrafanaQueryRequest {
    /// Requested panels.
    #[serde(default)]
    pub targets: Vec<GrafanaTarget>,
}

/// One requested panel.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GrafanaTarget {
    /// Target name as listed by the search endpoint.
    #[serde(default)]
    pub target: Option<String>,
}

/// Reply to the datasource connection test.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GrafanaStatus {
    /// Always `"ok"`.
    pub status: &'static str,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn tolerates_full_grafana_body() {
        let body = r#"{
            "range": {"from": "2024-06-01T00:00:00Z", "to": "2024-06-02T00:00:00Z"},
            "intervalMs": 60000,
            "targets": [
                {"target": "hourly_counts", "refId": "A", "type": "timeserie"},
                {"refId": "B"}
            ],
            "maxDataPoints": 500
        }"#;
        let Ok(req) = serde_json::from_str::<GrafanaQueryRequest>(body) else {
            panic!("grafana body should parse");
        };
        assert_eq!(req.targets.len(), 2);
        assert_eq!(req.targets.first().and_then(|t| t.target.as_deref()), Some("hourly_counts"));
        assert!(req.targets.get(1).is_some_and(|t| t.target.is_none()));
    }

    #[test]
    fn missing_targets_is_empty() {
        let Ok(req) = serde_json::from_str::<GrafanaQueryRequest>("{}") else {
            panic!("empty body should parse");
        };
        assert!(req.targets.is_empty());
    }
}
