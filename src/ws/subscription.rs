//! Per-connection subscription manager.
//!
//! Tracks which event types a WebSocket client wants and provides
//! server-side event filtering. New connections receive everything.

use std::collections::BTreeSet;

use crate::domain::LiveEvent;

/// Wildcard accepted in subscribe and unsubscribe commands.
pub const WILDCARD: &str = "*";

/// Manages the set of event types forwarded to a single connection.
#[derive(Debug)]
pub struct SubscriptionManager {
    event_types: BTreeSet<&'static str>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self {
            event_types: LiveEvent::EVENT_TYPES.into_iter().collect(),
        }
    }
}

impl SubscriptionManager {
    /// Creates a manager subscribed to every event type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds event types; `"*"` adds all. Returns the names accepted.
    pub fn subscribe(&mut self, names: &[String]) -> Vec<&'static str> {
        let accepted = resolve(names);
        self.event_types.extend(accepted.iter().copied());
        accepted
    }

    /// Removes event types; `"*"` removes all. Returns the names removed.
    pub fn unsubscribe(&mut self, names: &[String]) -> Vec<&'static str> {
        let removed = resolve(names);
        for name in &removed {
            self.event_types.remove(name);
        }
        removed
    }

    /// Returns `true` if the event passes the filter.
    #[must_use]
    pub fn matches(&self, event: &LiveEvent) -> bool {
        self.event_types.contains(event.event_type_str())
    }

    /// Currently forwarded event types, sorted.
    #[must_use]
    pub fn active(&self) -> Vec<&'static str> {
        self.event_types.iter().copied().collect()
    }
}

/// Maps requested names onto known event types, dropping unknown ones.
fn resolve(names: &[String]) -> Vec<&'static str> {
    if names.iter().any(|n| n == WILDCARD) {
        return LiveEvent::EVENT_TYPES.to_vec();
    }
    LiveEvent::EVENT_TYPES
        .into_iter()
        .filter(|known| names.iter().any(|n| n == known))
        .collect()
}
