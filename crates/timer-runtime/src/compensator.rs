//! Drift compensation for the tick schedule.
//!
//! Wake times form an arithmetic progression anchored at the moment the
//! timer started: `wake[k+1] = wake[k] + interval`. Handler execution time
//! therefore shortens the following sleep instead of delaying every later
//! tick.
//!
//! When a handler runs past the next wake time the progression is abandoned
//! and re-anchored at `end + offset`. Missed ticks are coalesced into that
//! single immediate tick; they are never replayed as a burst.

use std::time::{Duration, Instant};

/// Result of advancing the schedule past one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The next wake time follows the progression.
    OnSchedule(Instant),
    /// The handler overran; the schedule was re-anchored.
    Coalesced {
        /// Re-anchored wake time.
        wake: Instant,
        /// Scheduled wake times that passed while the handler was running.
        missed: u64,
    },
}

impl Advance {
    /// The wake time for the next tick.
    #[must_use]
    pub fn wake(&self) -> Instant {
        match *self {
            Advance::OnSchedule(wake) | Advance::Coalesced { wake, .. } => wake,
        }
    }

    /// Returns true if the schedule was re-anchored.
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        matches!(self, Advance::Coalesced { .. })
    }
}

/// Computes absolute wake times for a single schedule.
#[derive(Debug, Clone)]
pub struct DriftCompensator {
    /// Wake time of the pending tick.
    next_wake: Instant,
    /// Offset past the end of an overrunning tick.
    overrun_offset: Duration,
}

impl DriftCompensator {
    /// Anchor a new schedule; the first tick is due one interval after `anchor`.
    #[must_use]
    pub fn new(anchor: Instant, interval: Duration, overrun_offset: Duration) -> Self {
        Self {
            next_wake: anchor + interval,
            overrun_offset,
        }
    }

    /// Wake time of the pending tick.
    #[must_use]
    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    /// Advance past the tick that just finished at `end`.
    ///
    /// `interval` is read fresh on every call, so an interval change takes
    /// effect from the next computed wake time. The overrun offset is capped
    /// at `interval` so a coalesced tick never waits longer than a regular one.
    pub fn advance(&mut self, interval: Duration, end: Instant) -> Advance {
        let scheduled = self.next_wake + interval;

        if scheduled > end {
            self.next_wake = scheduled;
            return Advance::OnSchedule(scheduled);
        }

        let behind = end.duration_since(scheduled).as_nanos();
        let missed = u64::try_from(behind / interval.as_nanos().max(1))
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let wake = end + self.overrun_offset.min(interval);
        self.next_wake = wake;

        Advance::Coalesced { wake, missed }
    }
}
