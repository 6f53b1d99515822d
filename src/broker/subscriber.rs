//! MQTT session: connect, subscribe, decode, forward.
//!
//! [`BrokerSubscriber::run`] owns the `rumqttc` event loop. Every poll
//! error is followed by a pause and another poll, which makes the client
//! reconnect; there is no retry limit. Decoded readings go to the
//! ingestion queue in arrival order, so a slow consumer slows the poll
//! loop instead of dropping readings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use utoipa::ToSchema;

use super::payload;
use crate::config::BrokerConfig;
use crate::domain::SensorReading;
use crate::error::CounterError;

/// Bound on the MQTT client's outgoing request queue.
const REQUEST_QUEUE_CAPACITY: usize = 16;

/// How long shutdown waits for the DISCONNECT packet to go out.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// What happened to one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Decoded and queued for the tracker.
    Forwarded,
    /// Undecodable; dropped.
    Malformed,
    /// Arrived on a topic other than the sensor topic.
    IgnoredTopic,
    /// The ingestion queue is gone.
    QueueClosed,
}

#[derive(Debug, Default)]
struct SubscriberStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    malformed: AtomicU64,
    ignored: AtomicU64,
}

/// Message counters since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubscriberCounters {
    /// Publish packets received.
    pub received: u64,
    /// Readings handed to the tracker.
    pub forwarded: u64,
    /// Payloads dropped as undecodable.
    pub malformed: u64,
    /// Messages on other topics.
    pub ignored: u64,
}

/// Read-only view of the subscriber's connection state and counters.
#[derive(Debug, Clone)]
pub struct BrokerLink {
    connected: watch::Receiver<bool>,
    stats: Arc<SubscriberStats>,
    broker: String,
    topic: String,
}

impl BrokerLink {
    /// Creates a link not backed by a subscriber; the returned sender
    /// drives its `connected` flag.
    #[must_use]
    pub fn detached(broker: &str, topic: &str) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        let link = Self {
            connected: rx,
            stats: Arc::new(SubscriberStats::default()),
            broker: broker.to_string(),
            topic: topic.to_string(),
        };
        (tx, link)
    }

    /// `true` while the broker session is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// A receiver that observes every change of the `connected` flag.
    #[must_use]
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Broker `host:port`.
    #[must_use]
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current message counters.
    #[must_use]
    pub fn counters(&self) -> SubscriberCounters {
        SubscriberCounters {
            received: self.stats.received.load(Ordering::Relaxed),
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            malformed: self.stats.malformed.load(Ordering::Relaxed),
            ignored: self.stats.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Maintains the broker session and feeds the ingestion queue.
#[derive(Debug)]
pub struct BrokerSubscriber {
    config: BrokerConfig,
    readings: mpsc::Sender<SensorReading>,
    connected: watch::Sender<bool>,
    stats: Arc<SubscriberStats>,
}

impl BrokerSubscriber {
    /// Creates a subscriber that forwards into `readings`.
    ///
    /// Nothing connects until [`run`](Self::run) is called.
    #[must_use]
    pub fn new(config: BrokerConfig, readings: mpsc::Sender<SensorReading>) -> (Self, BrokerLink) {
        let (connected, connected_rx) = watch::channel(false);
        let stats = Arc::new(SubscriberStats::default());
        let link = BrokerLink {
            connected: connected_rx,
            stats: Arc::clone(&stats),
            broker: config.address(),
            topic: config.topic.clone(),
        };
        let subscriber = Self {
            config,
            readings,
            connected,
            stats,
        };
        (subscriber, link)
    }

    /// Handles one publish packet.
    pub async fn handle_publish(&self, topic: &str, payload: &[u8]) -> Dispatch {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        if topic != self.config.topic {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(topic, "ignoring message on foreign topic");
            return Dispatch::IgnoredTopic;
        }

        let reading = match payload::decode(payload, Utc::now()) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping sensor payload"
                );
                return Dispatch::Malformed;
            }
        };

        tracing::debug!(state = %reading.state, "sensor reading received");
        if self.readings.send(reading).await.is_err() {
            return Dispatch::QueueClosed;
        }
        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        Dispatch::Forwarded
    }

    /// Runs the session until `shutdown` turns `true` (or its sender is
    /// dropped), or until the ingestion queue closes. Sends DISCONNECT
    /// before returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_QUEUE_CAPACITY);
        tracing::info!(
            broker = %self.config.address(),
            topic = %self.config.topic,
            client_id = %self.config.client_id,
            "connecting to broker"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            self.on_connected(&client);
                        } else {
                            tracing::warn!(code = ?ack.code, "broker refused connection");
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        tracing::info!(pkid = ack.pkid, topic = %self.config.topic, "subscribed");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if self.handle_publish(&publish.topic, &publish.payload).await
                            == Dispatch::QueueClosed
                        {
                            tracing::warn!("ingestion queue closed; stopping subscriber");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        self.set_connected(false);
                        tracing::warn!("broker sent disconnect");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.set_connected(false);
                        tracing::warn!(
                            error = %e,
                            retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
                            "broker connection error; reconnecting"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(self.config.reconnect_delay) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                }
            }
        }

        self.disconnect(&client, &mut eventloop).await;
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        if let Some((user, pass)) = &self.config.credentials {
            options.set_credentials(user.clone(), pass.clone());
        }
        options
    }

    fn on_connected(&self, client: &AsyncClient) {
        self.set_connected(true);
        tracing::info!(broker = %self.config.address(), "connected to broker");
        let subscribed = client
            .try_subscribe(self.config.topic.clone(), QoS::AtLeastOnce)
            .map_err(CounterError::from);
        if let Err(e) = subscribed {
            tracing::error!(error = %e, topic = %self.config.topic, "subscribe request failed");
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }

    async fn disconnect(&self, client: &AsyncClient, eventloop: &mut EventLoop) {
        let was_connected = *self.connected.borrow();
        self.set_connected(false);
        if !was_connected {
            tracing::info!("broker subscriber stopped");
            return;
        }

        if let Err(e) = client.try_disconnect().map_err(CounterError::from) {
            tracing::warn!(error = %e, "disconnect request failed");
            return;
        }
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            tracing::warn!("timed out sending disconnect");
        }
        tracing::info!("disconnected from broker");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::SensorState;

    fn config() -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            topic: "sensores/barreira/estado".to_string(),
            client_id: "test-client".to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn forwards_valid_readings_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let (subscriber, link) = BrokerSubscriber::new(config(), tx);

        for body in [&br#"{"state":"interrupted"}"#[..], br#"{"state":"free"}"#] {
            assert_eq!(
                subscriber.handle_publish("sensores/barreira/estado", body).await,
                Dispatch::Forwarded
            );
        }

        let states: Vec<SensorState> = [rx.recv().await, rx.recv().await]
            .into_iter()
            .flatten()
            .map(|r| r.state)
            .collect();
        assert_eq!(states, [SensorState::Interrupted, SensorState::Free]);
        assert_eq!(link.counters().forwarded, 2);
    }

    #[tokio::test]
    async fn malformed_payloads_are_counted_and_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let (subscriber, link) = BrokerSubscriber::new(config(), tx);

        for body in [&b"not json"[..], br#"{"foo":"bar"}"#, br#"{"state":"sideways"}"#] {
            assert_eq!(
                subscriber.handle_publish("sensores/barreira/estado", body).await,
                Dispatch::Malformed
            );
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(
            link.counters(),
            SubscriberCounters {
                received: 3,
                forwarded: 0,
                malformed: 3,
                ignored: 0
            }
        );
    }

    #[tokio::test]
    async fn other_topics_are_ignored() {
        let (tx, mut rx) = mpsc::channel(8);
        let (subscriber, link) = BrokerSubscriber::new(config(), tx);
        let dispatch = subscriber
            .handle_publish("sensors/other", br#"{"state":"free"}"#)
            .await;
        assert_eq!(dispatch, Dispatch::IgnoredTopic);
        assert!(rx.try_recv().is_err());
        assert_eq!(link.counters().ignored, 1);
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let (subscriber, _) = BrokerSubscriber::new(config(), tx);
        let dispatch = subscriber
            .handle_publish("sensores/barreira/estado", br#"{"state":"free"}"#)
            .await;
        assert_eq!(dispatch, Dispatch::QueueClosed);
    }

    #[tokio::test]
    async fn unreachable_broker_retries_until_shutdown() {
        let (tx, _rx) = mpsc::channel(1);
        let (subscriber, link) = BrokerSubscriber::new(config(), tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(subscriber.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert!(!link.is_connected());

        shutdown_tx.send_replace(true);
        let stopped = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[test]
    fn detached_link_follows_sender() {
        let (tx, link) = BrokerLink::detached("host:1", "t");
        assert!(!link.is_connected());
        tx.send_replace(true);
        assert!(link.is_connected());
        assert_eq!(link.broker(), "host:1");
        assert_eq!(link.topic(), "t");
    }
}
