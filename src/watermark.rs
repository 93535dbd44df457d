//! Event watermark tracking
//!
//! The watermark is the newest event creation time already written to the event
//! log. It bounds every event query so that an event is recorded once and only
//! once across back-to-back collection cycles.
//!
//! Boundary policy: once an event at time `t` has been recorded, the next query
//! starts at `t + 1µs` rather than at `t`. Two events sharing the watermark
//! timestamp would otherwise be fetched again on every following cycle. The cost
//! is that an event created at exactly `t` but written to the source after the
//! query that observed `t` is never picked up. That trade-off is accepted; one
//! microsecond is the resolution of journal timestamps.

use crate::samples::Timestamp;
use chrono::{DateTime, Duration, Utc};
use log::debug;

/// Smallest step past an observed timestamp, in microseconds
pub const BOUNDARY_STEP_MICROS: i64 = 1;

fn boundary_step() -> Duration {
    Duration::microseconds(BOUNDARY_STEP_MICROS)
}

/// Tracks the newest event timestamp already recorded
///
/// Owned by the event collector for the lifetime of one cycle runner. There is a
/// single writer and no concurrent readers; it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    last_seen: Timestamp,
    /// False while `last_seen` is the initial lower bound rather than an observed event
    observed: bool,
}

impl Watermark {
    /// Start with an inclusive lower bound and no observed events
    pub fn starting_at(initial: Timestamp) -> Self {
        Self {
            last_seen: initial,
            observed: false,
        }
    }

    /// Start `lookback` before `now`, clamped to the earliest representable instant
    pub fn looking_back(now: Timestamp, lookback: Duration) -> Self {
        Self::starting_at(now.checked_sub_signed(lookback).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    /// Newest recorded event time, or the initial bound if nothing was recorded yet
    pub fn current(&self) -> Timestamp {
        self.last_seen
    }

    /// Whether any event has been recorded through this watermark
    pub fn has_observed(&self) -> bool {
        self.observed
    }

    /// Inclusive lower bound for the next query
    ///
    /// Callers capture this once per cycle and use the same value for every source.
    pub fn query_start(&self) -> Timestamp {
        if self.observed {
            self.last_seen + boundary_step()
        } else {
            self.last_seen
        }
    }

    /// True when an event created at `time` lies inside the unrecorded range
    pub fn admits(&self, time: Timestamp) -> bool {
        time >= self.query_start()
    }

    /// Advance to the newest of `observed`, never moving backwards
    ///
    /// Returns `true` if the watermark moved. An empty iterator leaves it unchanged.
    pub fn advance<I>(&mut self, observed: I) -> bool
    where
        I: IntoIterator<Item = Timestamp>,
    {
        let newest = match observed.into_iter().max() {
            Some(newest) => newest,
            None => return false,
        };

        if newest > self.last_seen || (newest == self.last_seen && !self.observed) {
            debug!("Advancing event watermark {} -> {}", self.last_seen, newest);
            self.last_seen = newest;
            self.observed = true;
            true
        } else {
            false
        }
    }
}
