//! Single consumer driving the tracker from the reading queue.
//!
//! The broker subscriber pushes validated readings into a bounded
//! [`mpsc`] channel. One [`IngestionWorker`] drains it in order, applies
//! the edge rule and, on a crossing, awaits the [`CountSink`] before
//! taking the next reading.

use tokio::sync::{mpsc, watch};

use crate::domain::{
    EventBus, LiveEvent, SensorReading, SensorSnapshot, SensorStateTracker, Transition,
};
use crate::persistence::{CountSink, NewCountEvent};

/// Totals reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    /// Readings taken from the queue.
    pub observed: u64,
    /// Counts stored.
    pub counted: u64,
    /// Counts detected but lost to a failed write.
    pub failed_writes: u64,
}

/// Owns the [`SensorStateTracker`] and forwards detected counts.
#[derive(Debug)]
pub struct IngestionWorker<S: CountSink> {
    tracker: SensorStateTracker,
    sink: S,
    snapshots: watch::Sender<SensorSnapshot>,
    event_bus: EventBus,
    summary: IngestionSummary,
}

impl<S: CountSink> IngestionWorker<S> {
    /// Creates a worker with a fresh tracker.
    ///
    /// Returns the receiving side of the tracker snapshot feed.
    #[must_use]
    pub fn new(sink: S, event_bus: EventBus) -> (Self, watch::Receiver<SensorSnapshot>) {
        let tracker = SensorStateTracker::new();
        let (snapshots, snapshot_rx) = watch::channel(tracker.snapshot());
        let worker = Self {
            tracker,
            sink,
            snapshots,
            event_bus,
            summary: IngestionSummary::default(),
        };
        (worker, snapshot_rx)
    }

    /// Applies one reading.
    ///
    /// A failed write is logged and counted; the crossing is lost.
    pub async fn process(&mut self, reading: SensorReading) -> Transition {
        let previous = self.tracker.last_state();
        let outcome = self.tracker.observe_at(reading.state, reading.received_at);
        self.summary.observed = self.summary.observed.saturating_add(1);

        let snapshot = self.tracker.snapshot();
        self.snapshots.send_replace(snapshot);
        if snapshot.state != previous {
            let _ = self.event_bus.publish(LiveEvent::SensorStateChanged {
                state: snapshot.state,
                timestamp: reading.received_at,
            });
        }

        if outcome == Transition::CountEventEmitted {
            let event = NewCountEvent {
                occurred_at: reading.received_at,
            };
            match self.sink.record(event).await {
                Ok(stored) => {
                    self.summary.counted = self.summary.counted.saturating_add(1);
                    let _ = self.event_bus.publish(LiveEvent::CountRecorded {
                        id: stored.id,
                        timestamp: stored.timestamp,
                    });
                }
                Err(e) => {
                    self.summary.failed_writes = self.summary.failed_writes.saturating_add(1);
                    tracing::error!(
                        error = %e,
                        occurred_at = %reading.received_at,
                        "crossing detected but not stored"
                    );
                }
            }
        }
        outcome
    }

    /// Drains `readings` until every sender is dropped.
    pub async fn run(mut self, mut readings: mpsc::Receiver<SensorReading>) -> IngestionSummary {
        tracing::info!("ingestion worker started");
        while let Some(reading) = readings.recv().await {
            self.process(reading).await;
        }
        tracing::info!(
            observed = self.summary.observed,
            counted = self.summary.counted,
            failed_writes = self.summary.failed_writes,
            "ingestion worker stopped"
        );
        self.summary
    }

    /// Totals so far.
    #[must_use]
    pub const fn summary(&self) -> IngestionSummary {
        self.summary
    }
}
