//! Sensor payload decoding.
//!
//! Payloads are JSON objects with a required `state` string and an
//! optional `timestamp` that is passed through untouched. Firmware sends
//! `timestamp_ms` instead; when both are present `timestamp` wins. Extra
//! fields are ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{SensorReading, SensorState};

/// Why a payload was dropped.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Not JSON, or not a JSON object.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid object without a `state` string.
    #[error("payload has no `state` field")]
    MissingState,

    /// `state` present but not a recognised barrier state.
    #[error("unrecognized sensor state: {0:?}")]
    UnrecognizedState(String),
}

#[derive(Debug, Deserialize)]
struct SensorPayload {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    timestamp_ms: Option<serde_json::Value>,
}

/// Decodes one message body into a [`SensorReading`] received at `received_at`.
///
/// # Errors
///
/// Returns a [`PayloadError`] describing why the message must be dropped.
pub fn decode(payload: &[u8], received_at: DateTime<Utc>) -> Result<SensorReading, PayloadError> {
    let parsed: SensorPayload = serde_json::from_slice(payload)?;
    let raw = parsed.state.ok_or(PayloadError::MissingState)?;
    let state =
        SensorState::from_wire(&raw).ok_or_else(|| PayloadError::UnrecognizedState(raw.clone()))?;

    Ok(SensorReading {
        state,
        received_at,
        device_timestamp: parsed.timestamp.or(parsed.timestamp_ms),
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decodes_state_and_passes_timestamp_through() {
        let now = Utc::now();
        let Ok(reading) = decode(br#"{"state":"interrupted","timestamp":12345}"#, now) else {
            panic!("expected valid payload");
        };
        assert_eq!(reading.state, SensorState::Interrupted);
        assert_eq!(reading.received_at, now);
        assert_eq!(reading.device_timestamp, Some(serde_json::json!(12345)));
    }

    #[test]
    fn accepts_firmware_payload() {
        let body = br#"{"id":"esp32","timestamp_ms":991,"state":"livre","uptime_s":3,"rssi":-60}"#;
        let Ok(reading) = decode(body, Utc::now()) else {
            panic!("expected valid payload");
        };
        assert_eq!(reading.state, SensorState::Free);
        assert_eq!(reading.device_timestamp, Some(serde_json::json!(991)));
    }

    #[test]
    fn accepts_both_timestamp_keys() {
        let body = br#"{"state":"free","timestamp":1,"timestamp_ms":2}"#;
        let Ok(reading) = decode(body, Utc::now()) else {
            panic!("payload carrying both timestamp keys must decode");
        };
        assert_eq!(reading.state, SensorState::Free);
        assert_eq!(reading.device_timestamp, Some(serde_json::json!(1)));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            decode(b"not json", Utc::now()),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            decode(b"[1,2]", Utc::now()),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_state() {
        assert!(matches!(
            decode(br#"{"foo":"bar"}"#, Utc::now()),
            Err(PayloadError::MissingState)
        ));
        assert!(matches!(
            decode(br#"{"status":"online"}"#, Utc::now()),
            Err(PayloadError::MissingState)
        ));
    }

    #[test]
    fn rejects_unknown_state_words() {
        assert!(matches!(
            decode(br#"{"state":"unknown"}"#, Utc::now()),
            Err(PayloadError::UnrecognizedState(_))
        ));
        assert!(decode(br#"{"state":42}"#, Utc::now()).is_err());
    }
}
