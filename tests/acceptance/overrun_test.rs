//! Overrun and ordering acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - A handler that runs longer than 3x the interval is followed by exactly
//!   one immediate tick, then the regular cadence resumes
//! - Under sustained overload ticks run back-to-back, never in a burst of
//!   catch-up ticks
//! - Ticks of one timer never overlap

use super::common::{periods, TickLog};
use std::thread;
use std::time::Duration;
use timer_runtime::PreciseTimer;

#[test]
fn test_single_overrun_fires_one_immediate_tick() {
    let interval = Duration::from_millis(20);
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|i| {
        if i == 0 {
            Duration::from_millis(100)
        } else {
            Duration::ZERO
        }
    }));

    timer.start(interval).unwrap();
    assert!(log.wait_for(5, Duration::from_secs(2)));
    timer.stop();

    let starts = log.starts();
    let gaps = periods(&starts);

    // Tick 1 starts right after the 100ms handler returns
    assert!(
        gaps[0] >= Duration::from_millis(100) && gaps[0] < Duration::from_millis(115),
        "gap after overrun was {:?}",
        gaps[0]
    );
    // Then the regular cadence resumes instead of replaying missed ticks
    for gap in &gaps[1..4] {
        assert!(*gap >= Duration::from_millis(15), "catch-up burst: gap {gap:?}");
    }

    let metrics = timer.metrics();
    assert_eq!(metrics.coalesced_count, 1);
    assert_eq!(metrics.overrun_count, 1);
}

#[test]
fn test_sustained_overload_runs_back_to_back() {
    let interval = Duration::from_millis(10);
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|_| Duration::from_millis(25)));

    timer.start(interval).unwrap();
    assert!(log.wait_for(6, Duration::from_secs(2)));
    timer.stop();

    for gap in periods(&log.starts()) {
        assert!(gap >= Duration::from_millis(25), "ticks overlapped or burst: {gap:?}");
        assert!(gap < Duration::from_millis(40), "tick delayed: {gap:?}");
    }
    assert_eq!(log.overlaps(), 0);

    let metrics = timer.metrics();
    assert_eq!(metrics.coalesced_count, metrics.total_ticks);
}

#[test]
fn test_ticks_never_overlap() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|i| Duration::from_millis((i as u64 % 4) * 3)));

    timer.start(Duration::from_millis(5)).unwrap();
    thread::sleep(Duration::from_millis(300));
    timer.stop();

    assert!(log.count() > 10);
    assert_eq!(log.overlaps(), 0);
    assert!(!log.in_progress());
}

#[test]
fn test_recovers_cadence_after_overload_ends() {
    let interval = Duration::from_millis(20);
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|i| {
        if i < 3 {
            Duration::from_millis(45)
        } else {
            Duration::ZERO
        }
    }));

    timer.start(interval).unwrap();
    assert!(log.wait_for(10, Duration::from_secs(2)));
    timer.stop();

    let gaps = periods(&log.starts());
    for gap in &gaps[4..9] {
        assert!(
            *gap > Duration::from_millis(15) && *gap < Duration::from_millis(25),
            "cadence not restored: {gap:?}"
        );
    }
}
