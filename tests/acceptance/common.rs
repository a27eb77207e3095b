//! Common utilities for acceptance tests.
//!
//! Provides a recording tick handler with a reentrancy guard and helpers
//! for turning recorded tick instants into period statistics.

#![allow(dead_code)] // Not every test module uses every helper

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Shared record of every tick a handler saw.
#[derive(Clone, Default)]
pub struct TickLog {
    starts: Arc<Mutex<Vec<Instant>>>,
    active: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl TickLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a handler that records each tick, then sleeps for `work(index)`.
    pub fn handler<W>(&self, work: W) -> impl FnMut() + Send + 'static
    where
        W: Fn(usize) -> Duration + Send + 'static,
    {
        let log = self.clone();
        move || {
            if log.active.swap(true, Ordering::SeqCst) {
                log.overlaps.fetch_add(1, Ordering::SeqCst);
            }

            let index = {
                let mut starts = log.starts.lock().unwrap();
                starts.push(Instant::now());
                starts.len() - 1
            };

            let busy = work(index);
            if !busy.is_zero() {
                thread::sleep(busy);
            }

            log.active.store(false, Ordering::SeqCst);
        }
    }

    /// Handler with negligible execution time.
    pub fn idle_handler(&self) -> impl FnMut() + Send + 'static {
        self.handler(|_| Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn in_progress(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Poll until at least `n` ticks were recorded or `timeout` passes.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count() >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        self.count() >= n
    }
}

/// Gaps between consecutive tick starts.
pub fn periods(starts: &[Instant]) -> Vec<Duration> {
    starts.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Mean of a set of durations.
pub fn mean(durations: &[Duration]) -> Duration {
    assert!(!durations.is_empty(), "no durations to average");
    let total: Duration = durations.iter().sum();
    total / u32::try_from(durations.len()).unwrap()
}

/// Absolute difference between two durations.
pub fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Largest deviation of tick `k` from `starts[0] + k * interval`.
pub fn max_phase_error(starts: &[Instant], interval: Duration) -> Duration {
    let first = starts[0];
    starts
        .iter()
        .enumerate()
        .map(|(k, &t)| abs_diff(t - first, interval * u32::try_from(k).unwrap()))
        .max()
        .unwrap_or_default()
}
