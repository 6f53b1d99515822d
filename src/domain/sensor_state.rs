//! Light-barrier state vocabulary.
//!
//! [`SensorState`] is the in-memory view of the barrier. It is never
//! persisted and starts as [`SensorState::Unknown`] on every process start.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Observed state of the light barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorState {
    /// Nothing is blocking the beam.
    Free,
    /// An object is blocking the beam.
    Interrupted,
    /// No valid reading received yet.
    #[default]
    Unknown,
}

impl SensorState {
    /// Parses a state word from a sensor payload.
    ///
    /// Accepts the canonical `free` / `interrupted` and the words the
    /// field firmware publishes (`livre`, `interrompido`, `interrompida`),
    /// ignoring ASCII case and surrounding whitespace. Anything else,
    /// `unknown` included, yields `None`: it is not a reading.
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        let word = raw.trim().to_ascii_lowercase();
        match word.as_str() {
            "free" | "livre" => Some(Self::Free),
            "interrupted" | "interrompido" | "interrompida" => Some(Self::Interrupted),
            _ => None,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Interrupted => "interrupted",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` for `free` and `interrupted`.
    #[must_use]
    pub const fn is_canonical(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated state value as it leaves the broker subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Decoded barrier state.
    pub state: SensorState,
    /// When this process received the message.
    pub received_at: DateTime<Utc>,
    /// Device-supplied timestamp, passed through untouched.
    pub device_timestamp: Option<serde_json::Value>,
}

impl SensorReading {
    /// Creates a reading received now with no device timestamp.
    #[must_use]
    pub fn now(state: SensorState) -> Self {
        Self {
            state,
            received_at: Utc::now(),
            device_timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_words_parse() {
        assert_eq!(SensorState::from_wire("free"), Some(SensorState::Free));
        assert_eq!(
            SensorState::from_wire("interrupted"),
            Some(SensorState::Interrupted)
        );
    }

    #[test]
    fn firmware_words_parse_case_insensitively() {
        assert_eq!(SensorState::from_wire(" Livre "), Some(SensorState::Free));
        assert_eq!(
            SensorState::from_wire("INTERROMPIDO"),
            Some(SensorState::Interrupted)
        );
        assert_eq!(
            SensorState::from_wire("interrompida"),
            Some(SensorState::Interrupted)
        );
    }

    #[test]
    fn unknown_and_garbage_are_rejected() {
        assert_eq!(SensorState::from_wire("unknown"), None);
        assert_eq!(SensorState::from_wire(""), None);
        assert_eq!(SensorState::from_wire("open"), None);
    }

    #[test]
    fn default_is_unknown() {
        assert_eq!(SensorState::default(), SensorState::Unknown);
        assert!(!SensorState::Unknown.is_canonical());
        assert_eq!(SensorState::Interrupted.to_string(), "interrupted");
    }
}
