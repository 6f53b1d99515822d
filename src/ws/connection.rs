//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered live events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{LiveEvent, SensorSnapshot};
use crate::service::HealthMonitor;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<LiveEvent>,
    health: HealthMonitor,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();
    tracing::debug!("ws connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs, health.sensor_snapshot());
                        if let Some(json) = reply
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(live_event) => {
                        if !subs.matches(&live_event) {
                            continue;
                        }
                        let Some(json) = event_message(&live_event) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn event_message(event: &LiveEvent) -> Option<String> {
    let payload = serde_json::to_value(event).ok()?;
    let msg = WsMessage::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload);
    serde_json::to_string(&msg).ok()
}

/// Handles a text message from the client, returning an optional JSON reply.
fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    snapshot: SensorSnapshot,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let payload = match command {
        WsCommand::Subscribe { event_types } => serde_json::json!({
            "subscribed": subs.subscribe(&event_types),
            "active": subs.active(),
        }),
        WsCommand::Unsubscribe { event_types } => serde_json::json!({
            "unsubscribed": subs.unsubscribe(&event_types),
            "active": subs.active(),
        }),
        WsCommand::GetState => serde_json::json!({
            "state": snapshot.state,
            "updated_at": snapshot.updated_at,
        }),
    };
    serde_json::to_string(&WsMessage::new(msg.id, WsMessageType::Response, payload)).ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SensorState;

    fn reply(text: &str, subs: &mut SubscriptionManager) -> serde_json::Value {
        let snapshot = SensorSnapshot {
            state: SensorState::Interrupted,
            updated_at: None,
        };
        let Some(json) = handle_text_message(text, subs, snapshot) else {
            panic!("expected a reply");
        };
        let Ok(value) = serde_json::from_str(&json) else {
            panic!("reply is not JSON");
        };
        value
    }

    #[test]
    fn malformed_json_is_an_error() {
        let value = reply("{not json", &mut SubscriptionManager::new());
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], 400);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let value = reply(
            r#"{"id":"9","type":"command","payload":{"command":"swap"}}"#,
            &mut SubscriptionManager::new(),
        );
        assert_eq!(value["type"], "error");
        assert_eq!(value["id"], "9");
        assert_eq!(value["payload"]["code"], 404);
    }

    #[test]
    fn unsubscribe_replies_with_active_set() {
        let mut subs = SubscriptionManager::new();
        let value = reply(
            r#"{"id":"1","type":"command",
                "payload":{"command":"unsubscribe","event_types":["sensor_state_changed"]}}"#,
            &mut subs,
        );
        assert_eq!(value["type"], "response");
        assert_eq!(value["payload"]["active"], serde_json::json!(["count_recorded"]));
    }

    #[test]
    fn get_state_reports_snapshot() {
        let value = reply(
            r#"{"id":"2","type":"command","payload":{"command":"get_state"}}"#,
            &mut SubscriptionManager::new(),
        );
        assert_eq!(value["payload"]["state"], "interrupted");
    }

    #[test]
    fn events_are_wrapped_in_envelope() {
        let event = LiveEvent::CountRecorded {
            id: 5,
            timestamp: chrono::Utc::now(),
        };
        let Some(json) = event_message(&event) else {
            panic!("event should serialize");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&json) else {
            panic!("event is not JSON");
        };
        assert_eq!(value["type"], "event");
        assert_eq!(value["payload"]["event_type"], "count_recorded");
        assert_eq!(value["payload"]["id"], 5);
    }
}
