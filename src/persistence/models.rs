//! Database models for count events and their aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CounterError;

/// A stored row from the `count_events` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountEvent {
    /// Auto-increment row ID.
    pub id: i64,
    /// When the crossing was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Template for a count about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCountEvent {
    /// When the crossing occurred.
    pub occurred_at: DateTime<Utc>,
}

impl NewCountEvent {
    /// A count that occurred now.
    #[must_use]
    pub fn now() -> Self {
        Self {
            occurred_at: Utc::now(),
        }
    }
}

/// One dashboard datapoint, serialized as `[value, timestampMillis]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Datapoint(pub f64, pub i64);

impl Datapoint {
    /// Returns the value component.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Returns the epoch-millisecond timestamp component.
    #[must_use]
    pub const fn timestamp_ms(&self) -> i64 {
        self.1
    }
}

/// The single-row `today_stats` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct TodaySummary {
    /// Counts since local midnight of the database clock.
    pub total_count: i64,
    /// First count of the day, if any.
    pub first_event_at: Option<DateTime<Utc>>,
    /// Last count of the day, if any.
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Plain statistics over the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountStatistics {
    /// All rows ever written.
    pub total_count: i64,
    /// Rows written today.
    pub count_today: i64,
    /// Timestamp of the newest row.
    pub last_event_timestamp: Option<DateTime<Utc>>,
    /// When the statistics were read.
    pub query_timestamp: DateTime<Utc>,
}

/// Severity of a [`SystemLog`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Routine event.
    Info,
    /// Degraded but recovering.
    Warning,
    /// Failure needing attention.
    Error,
}

impl LogLevel {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CounterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            _ => Err(CounterError::InvalidRequest(format!(
                "level must be INFO, WARNING or ERROR, got {raw:?}"
            ))),
        }
    }
}

/// A stored row from the `system_logs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SystemLog {
    /// `INFO`, `WARNING` or `ERROR`.
    pub level: String,
    /// What happened.
    pub message: String,
    /// Component that wrote the row.
    pub source: String,
    /// When it was written.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn datapoint_serializes_as_pair() {
        let Ok(json) = serde_json::to_string(&Datapoint(3.0, 1_700_000_000_000)) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "[3.0,1700000000000]");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("warning".parse::<LogLevel>().ok(), Some(LogLevel::Warning));
        assert_eq!("ERROR".parse::<LogLevel>().ok(), Some(LogLevel::Error));
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert!(matches!(
            "DEBUG".parse::<LogLevel>(),
            Err(CounterError::InvalidRequest(_))
        ));
    }

    #[test]
    fn empty_today_summary_has_no_times() {
        let summary = TodaySummary::default();
        assert_eq!(summary.total_count, 0);
        assert!(summary.first_event_at.is_none());
    }
}
