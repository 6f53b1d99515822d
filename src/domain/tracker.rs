//! Edge detector turning barrier states into counts.
//!
//! The rule lives in [`transition`], a pure function of the previous and
//! the new state. [`SensorStateTracker`] owns the single `last_state`
//! value and applies the rule; it is driven by exactly one task, so it
//! carries no locking.
//!
//! The detector remembers one value only. It cannot tell a rapid double
//! crossing from sensor flicker.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SensorState;

/// Outcome of observing one state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// An `interrupted → free` edge was seen: one object crossed.
    CountEventEmitted,
    /// No count.
    NoOp,
}

/// Applies the edge rule to `(last, new)`.
///
/// Returns the next `last_state` and whether a count occurred.
/// `Unknown` is not a reading: it leaves `last` untouched.
#[must_use]
pub const fn transition(last: SensorState, new: SensorState) -> (SensorState, Transition) {
    match (last, new) {
        (_, SensorState::Unknown) => (last, Transition::NoOp),
        (SensorState::Interrupted, SensorState::Free) => {
            (SensorState::Free, Transition::CountEventEmitted)
        }
        (_, next) => (next, Transition::NoOp),
    }
}

/// Point-in-time copy of the tracker state, shared with readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SensorSnapshot {
    /// Last accepted barrier state.
    pub state: SensorState,
    /// When that state was accepted; `None` before the first reading.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Holds the last observed barrier state and applies the edge rule.
#[derive(Debug, Default)]
pub struct SensorStateTracker {
    last_state: SensorState,
    updated_at: Option<DateTime<Utc>>,
    emitted: u64,
}

impl SensorStateTracker {
    /// Creates a tracker in the [`SensorState::Unknown`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes a new state value received now.
    pub fn observe(&mut self, new_state: SensorState) -> Transition {
        self.observe_at(new_state, Utc::now())
    }

    /// Observes a new state value received at `at`.
    pub fn observe_at(&mut self, new_state: SensorState, at: DateTime<Utc>) -> Transition {
        if !new_state.is_canonical() {
            tracing::warn!(state = %new_state, "rejected non-canonical sensor state");
            return Transition::NoOp;
        }

        let (next, outcome) = transition(self.last_state, new_state);
        if next != self.last_state {
            tracing::debug!(from = %self.last_state, to = %next, "sensor state changed");
        }
        self.last_state = next;
        self.updated_at = Some(at);

        if outcome == Transition::CountEventEmitted {
            self.emitted = self.emitted.saturating_add(1);
        }
        outcome
    }

    /// Returns the last accepted state without mutating it.
    #[must_use]
    pub const fn last_state(&self) -> SensorState {
        self.last_state
    }

    /// Returns a copy of the current state for readers.
    #[must_use]
    pub const fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            state: self.last_state,
            updated_at: self.updated_at,
        }
    }

    /// Number of count events emitted since construction.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SensorState::{Free, Interrupted, Unknown};

    fn count(sequence: &[SensorState]) -> usize {
        let mut tracker = SensorStateTracker::new();
        sequence
            .iter()
            .filter(|s| tracker.observe(**s) == Transition::CountEventEmitted)
            .count()
    }

    #[test]
    fn counts_each_interrupted_to_free_edge() {
        let seq = [Interrupted, Interrupted, Free, Free, Interrupted, Free];
        assert_eq!(count(&seq), 2);
    }

    #[test]
    fn repeated_states_do_not_retrigger() {
        assert_eq!(count(&[Free, Free, Free]), 0);
        assert_eq!(count(&[Interrupted, Interrupted, Interrupted]), 0);
        assert_eq!(count(&[Interrupted, Free, Free, Free]), 1);
    }

    #[test]
    fn free_first_never_counts() {
        assert_eq!(count(&[Free, Interrupted]), 0);
    }

    #[test]
    fn unknown_is_rejected_without_mutation() {
        let mut tracker = SensorStateTracker::new();
        assert_eq!(tracker.observe(Interrupted), Transition::NoOp);
        assert_eq!(tracker.observe(Unknown), Transition::NoOp);
        assert_eq!(tracker.last_state(), Interrupted);
        assert_eq!(tracker.observe(Free), Transition::CountEventEmitted);
        assert_eq!(tracker.emitted(), 1);
    }

    #[test]
    fn transition_function_is_pure() {
        assert_eq!(
            transition(Interrupted, Free),
            (Free, Transition::CountEventEmitted)
        );
        assert_eq!(transition(Free, Interrupted), (Interrupted, Transition::NoOp));
        assert_eq!(transition(Unknown, Free), (Free, Transition::NoOp));
        assert_eq!(transition(Free, Unknown), (Free, Transition::NoOp));
    }

    #[test]
    fn matches_edge_count_for_generated_sequences() {
        // Every sequence over {free, interrupted, unknown} up to length 6.
        let alphabet = [Free, Interrupted, Unknown];
        for len in 0..=6u32 {
            for code in 0..3usize.pow(len) {
                let mut n = code;
                let mut seq = Vec::new();
                for _ in 0..len {
                    seq.extend(alphabet.get(n % 3).copied());
                    n /= 3;
                }
                let canonical: Vec<SensorState> =
                    seq.iter().copied().filter(SensorState::is_canonical).collect();
                let expected = canonical
                    .windows(2)
                    .filter(|w| **w == [Interrupted, Free])
                    .count();
                assert_eq!(count(&seq), expected, "sequence {seq:?}");
            }
        }
    }

    #[test]
    fn snapshot_reports_receipt_time() {
        let mut tracker = SensorStateTracker::new();
        assert_eq!(tracker.snapshot().updated_at, None);
        let at = Utc::now();
        tracker.observe_at(Interrupted, at);
        assert_eq!(
            tracker.snapshot(),
            SensorSnapshot {
                state: Interrupted,
                updated_at: Some(at)
            }
        );
    }
}
