//! Dashboard targets rendered in the Grafana simple-json shape.
//!
//! Each named target maps onto a fixed view, value column and day window,
//! so dashboard requests never reach SQL with caller-chosen identifiers.

use serde::Serialize;
use serde_json::{Value, json};

use super::AggregationQueryService;
use crate::error::CounterError;
use crate::persistence::{AggregationView, Datapoint, TodaySummary};

/// A dashboard metric a panel can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardTarget {
    /// Counts per hour over the last week.
    HourlyCounts,
    /// Counts per day over the last year.
    DailyCounts,
    /// Items per hour over the last two days.
    ProductionSpeed,
    /// Individual counts of the last day.
    RecentCounts,
    /// Today's summary as a table panel.
    TodayStatsTable,
}

impl DashboardTarget {
    /// Every target, in the order search results list them.
    pub const ALL: [Self; 5] = [
        Self::HourlyCounts,
        Self::DailyCounts,
        Self::ProductionSpeed,
        Self::TodayStatsTable,
        Self::RecentCounts,
    ];

    /// Name used by dashboards to request this target.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::HourlyCounts => "hourly_counts",
            Self::DailyCounts => "daily_counts",
            Self::ProductionSpeed => "production_speed",
            Self::RecentCounts => "recent_counts",
            Self::TodayStatsTable => "today_stats_table",
        }
    }

    /// Looks up a target by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Series label, backing view and day window; `None` for tables.
    #[must_use]
    pub const fn series(&self) -> Option<(&'static str, AggregationView, u32)> {
        match self {
            Self::HourlyCounts => Some(("Items per Hour", AggregationView::HourlyCounts, 7)),
            Self::DailyCounts => Some(("Items per Day", AggregationView::DailyCounts, 365)),
            Self::ProductionSpeed => Some((
                "Production Speed (items/h)",
                AggregationView::ProductionSpeed,
                2,
            )),
            Self::RecentCounts => Some(("Real-time Counts", AggregationView::RecentCounts, 1)),
            Self::TodayStatsTable => None,
        }
    }
}

/// One entry of a dashboard query response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DashboardResponse {
    /// A time series panel.
    TimeSeries {
        /// Series label.
        target: String,
        /// `[value, timestampMillis]` pairs ascending by time.
        datapoints: Vec<Datapoint>,
    },
    /// A table panel.
    Table {
        /// Always `"table"`.
        #[serde(rename = "type")]
        kind: &'static str,
        /// Column headers.
        columns: Vec<Value>,
        /// Table rows.
        rows: Vec<Vec<Value>>,
    },
}

impl DashboardResponse {
    /// Renders today's summary as a one-row table.
    #[must_use]
    pub fn today_table(summary: &TodaySummary) -> Self {
        let time_or_na = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map_or_else(|| "N/A".to_string(), |t| t.to_rfc3339())
        };
        Self::Table {
            kind: "table",
            columns: vec![
                json!({"text": "Total Counts Today", "type": "number"}),
                json!({"text": "First Count Time", "type": "string"}),
                json!({"text": "Last Count Time", "type": "string"}),
            ],
            rows: vec![vec![
                json!(summary.total_count),
                json!(time_or_na(summary.first_event_at)),
                json!(time_or_na(summary.last_event_at)),
            ]],
        }
    }
}

impl AggregationQueryService {
    /// Names of every dashboard target.
    #[must_use]
    pub fn list_targets(&self) -> Vec<&'static str> {
        DashboardTarget::ALL.iter().map(DashboardTarget::name).collect()
    }

    /// Renders one dashboard target; unknown names render nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`CounterError`] if the backing query fails.
    pub async fn render_target(
        &self,
        name: &str,
    ) -> Result<Option<DashboardResponse>, CounterError> {
        let Some(target) = DashboardTarget::from_name(name) else {
            tracing::debug!(target = name, "unknown dashboard target");
            return Ok(None);
        };

        let response = match target.series() {
            Some((label, view, days)) => DashboardResponse::TimeSeries {
                target: label.to_string(),
                datapoints: self
                    .query_view(view, view.default_column(), days)
                    .await?,
            },
            None => DashboardResponse::today_table(&self.today_summary().await?),
        };
        Ok(Some(response))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn every_target_round_trips_by_name() {
        for target in DashboardTarget::ALL {
            assert_eq!(DashboardTarget::from_name(target.name()), Some(target));
        }
        assert_eq!(DashboardTarget::from_name("nope"), None);
    }

    #[test]
    fn series_targets_use_catalog_views() {
        let Some((_, view, days)) = DashboardTarget::HourlyCounts.series() else {
            panic!("hourly is a series");
        };
        assert_eq!(view, AggregationView::HourlyCounts);
        assert_eq!(days, 7);
        assert!(DashboardTarget::TodayStatsTable.series().is_none());
    }

    #[test]
    fn time_series_serializes_grafana_shape() {
        let response = DashboardResponse::TimeSeries {
            target: "Items per Hour".to_string(),
            datapoints: vec![Datapoint(4.0, 1_000), Datapoint(2.0, 2_000)],
        };
        let Ok(json) = serde_json::to_value(&response) else {
            panic!("serialization failed");
        };
        assert_eq!(
            json,
            json!({"target": "Items per Hour", "datapoints": [[4.0, 1000], [2.0, 2000]]})
        );
    }

    #[test]
    fn today_table_fills_missing_times() {
        let table = DashboardResponse::today_table(&TodaySummary::default());
        let Ok(json) = serde_json::to_value(table) else {
            panic!("serialization failed");
        };
        assert_eq!(json["type"], "table");
        assert_eq!(json["rows"][0], json!([0, "N/A", "N/A"]));
    }

    #[test]
    fn today_table_renders_times() {
        let first = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single();
        let summary = TodaySummary {
            total_count: 3,
            first_event_at: first,
            last_event_at: first,
        };
        let Ok(json) = serde_json::to_value(DashboardResponse::today_table(&summary)) else {
            panic!("serialization failed");
        };
        assert_eq!(json["rows"][0][0], 3);
        assert_eq!(json["rows"][0][1], "2024-06-01T08:00:00+00:00");
    }
}
