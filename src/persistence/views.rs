//! Allow-listed aggregation views and their SQL templates.
//!
//! View and column names are the only identifiers that end up inside SQL
//! text. They pass two gates before that: a character check
//! ([`validate_identifier`]) and membership in the [`AggregationView`]
//! catalog. The SQL is then built from the catalog's `&'static str`
//! names, never from the caller's string. Day windows and limits are
//! always bound parameters.

use crate::error::CounterError;

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Read-only projections of `count_events` served as time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationView {
    /// Counts per hour bucket.
    HourlyCounts,
    /// Counts per day bucket.
    DailyCounts,
    /// Items per hour, per hour bucket.
    ProductionSpeed,
    /// Raw events of the last 24 hours.
    RecentCounts,
}

impl AggregationView {
    /// Every view in the catalog.
    pub const ALL: [Self; 4] = [
        Self::HourlyCounts,
        Self::DailyCounts,
        Self::ProductionSpeed,
        Self::RecentCounts,
    ];

    /// Database view name.
    #[must_use]
    pub const fn view_name(&self) -> &'static str {
        match self {
            Self::HourlyCounts => "hourly_counts",
            Self::DailyCounts => "daily_counts",
            Self::ProductionSpeed => "production_speed",
            Self::RecentCounts => "recent_counts_24h",
        }
    }

    /// Columns that may be selected as the datapoint value.
    #[must_use]
    pub const fn value_columns(&self) -> &'static [&'static str] {
        match self {
            Self::HourlyCounts | Self::DailyCounts => &["total_counts"],
            Self::ProductionSpeed => &["items_per_hour"],
            Self::RecentCounts => &["id"],
        }
    }

    /// The column dashboards use by default.
    #[must_use]
    pub const fn default_column(&self) -> &'static str {
        match self {
            Self::HourlyCounts | Self::DailyCounts => "total_counts",
            Self::ProductionSpeed => "items_per_hour",
            Self::RecentCounts => "id",
        }
    }

    /// Looks up a view by its database name.
    #[must_use]
    pub fn from_view_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.view_name() == name)
    }

    /// Validates a caller-supplied `(view, column)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::InvalidIdentifier`] if either name has
    /// characters outside `[A-Za-z0-9_]`, or is not in the catalog.
    pub fn resolve(
        view_name: &str,
        value_column: &str,
    ) -> Result<(Self, &'static str), CounterError> {
        validate_identifier(view_name)?;
        validate_identifier(value_column)?;

        let view = Self::from_view_name(view_name)
            .ok_or_else(|| CounterError::InvalidIdentifier(view_name.to_string()))?;
        let column = view
            .value_columns()
            .iter()
            .copied()
            .find(|c| *c == value_column)
            .ok_or_else(|| CounterError::InvalidIdentifier(value_column.to_string()))?;
        Ok((view, column))
    }

    /// SQL selecting `(value, ts_ms)` rows within a day window bound as `$1`.
    #[must_use]
    pub fn series_sql(&self, column: &'static str) -> String {
        format!(
            "SELECT {column}::float8 AS value, (timestamp_unix * 1000)::int8 AS ts_ms \
             FROM {view} \
             WHERE timestamp_unix >= \
             EXTRACT(EPOCH FROM (CURRENT_DATE - make_interval(days => $1))) \
             ORDER BY ts_ms ASC",
            view = self.view_name(),
        )
    }
}

/// Checks that `raw` looks like a plain SQL identifier.
///
/// # Errors
///
/// Returns [`CounterError::InvalidIdentifier`] for empty or overlong
/// names, a leading digit, or any character outside `[A-Za-z0-9_]`.
pub fn validate_identifier(raw: &str) -> Result<&str, CounterError> {
    let mut chars = raw.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && raw.len() <= MAX_IDENTIFIER_LEN {
        Ok(raw)
    } else {
        tracing::warn!(identifier = raw, "rejected query identifier");
        Err(CounterError::InvalidIdentifier(raw.to_string()))
    }
}

/// Single-row summary of the current day.
pub const TODAY_SUMMARY_SQL: &str =
    "SELECT total_counts, first_count_time, last_count_time FROM today_stats LIMIT 1";

/// Total number of stored counts.
pub const TOTAL_COUNT_SQL: &str = "SELECT COUNT(*)::int8 FROM count_events";

/// Counts stored since the start of the current day.
pub const COUNT_TODAY_SQL: &str =
    "SELECT COUNT(*)::int8 FROM count_events WHERE timestamp >= date_trunc('day', now())";

/// Timestamp of the newest stored count.
pub const LAST_EVENT_SQL: &str = "SELECT MAX(timestamp) FROM count_events";

/// Page of raw counts, newest first; `$1` limit, `$2` offset.
pub const RECENT_COUNTS_SQL: &str =
    "SELECT id, timestamp FROM count_events ORDER BY timestamp DESC, id DESC LIMIT $1 OFFSET $2";

/// Newest system log rows; `$1` optional level filter, `$2` limit.
pub const SYSTEM_LOGS_SQL: &str = "SELECT level, message, source, timestamp FROM system_logs \
     WHERE ($1::text IS NULL OR level = $1) ORDER BY timestamp DESC, id DESC LIMIT $2";
