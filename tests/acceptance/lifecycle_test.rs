//! Lifecycle acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - 100ms interval for 1050ms yields 9-11 ticks
//! - No tick starts after `stop()` returns, or after the timer is dropped
//! - Repeated `start`/`stop` calls behave like single calls
//! - `stop()` waits for an in-flight handler and never cuts it short

use super::common::TickLog;
use std::thread;
use std::time::{Duration, Instant};
use timer_common::state::TimerState;
use timer_runtime::PreciseTimer;

#[test]
fn test_hundred_ms_for_just_over_a_second() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.start(Duration::from_millis(100)).unwrap();
    thread::sleep(Duration::from_millis(1050));
    timer.stop();

    let ticks = log.count();
    assert!(
        (9..=11).contains(&ticks),
        "expected 9-11 ticks, got {ticks}"
    );

    thread::sleep(Duration::from_millis(50));
    assert_eq!(log.count(), ticks, "tick observed after stop()");
}

#[test]
fn test_no_ticks_after_stop() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());
    let interval = Duration::from_millis(20);

    timer.start(interval).unwrap();
    assert!(log.wait_for(3, Duration::from_secs(2)));
    timer.stop();

    let at_stop = log.count();
    thread::sleep(interval * 3);
    assert_eq!(log.count(), at_stop);
    assert_eq!(timer.state(), TimerState::Stopped);
}

#[test]
fn test_double_start_has_single_effect() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.start(Duration::from_millis(50)).unwrap();
    timer.start(Duration::from_millis(50)).unwrap();
    thread::sleep(Duration::from_millis(530));
    timer.stop();

    // Two loops would produce ~20 ticks
    let ticks = log.count();
    assert!((9..=11).contains(&ticks), "expected ~10 ticks, got {ticks}");
    assert_eq!(log.overlaps(), 0);
}

#[test]
fn test_double_stop_is_harmless() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.start(Duration::from_millis(10)).unwrap();
    assert!(log.wait_for(1, Duration::from_secs(2)));
    timer.stop();
    let at_stop = log.count();
    timer.stop();

    assert!(!timer.is_running());
    assert_eq!(log.count(), at_stop);
}

#[test]
fn test_drop_without_stop_shuts_down() {
    let log = TickLog::new();
    let interval = Duration::from_millis(20);

    {
        let timer = PreciseTimer::new(log.idle_handler());
        timer.start(interval).unwrap();
        assert!(log.wait_for(2, Duration::from_secs(2)));
    }

    let at_drop = log.count();
    thread::sleep(interval * 3);
    assert_eq!(log.count(), at_drop);
}

#[test]
fn test_stop_waits_for_running_handler() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|_| Duration::from_millis(150)));

    timer.start(Duration::from_millis(10)).unwrap();
    assert!(log.wait_for(1, Duration::from_secs(2)));
    assert!(log.in_progress());

    let stop_called = Instant::now();
    timer.stop();

    // The 150ms handler finished before stop() returned
    assert!(!log.in_progress());
    assert!(stop_called.elapsed() >= Duration::from_millis(100));
    assert_eq!(log.count(), 1);
}

#[test]
fn test_stop_does_not_wait_out_the_interval() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.start(Duration::from_secs(10)).unwrap();
    thread::sleep(Duration::from_millis(20));

    let stop_called = Instant::now();
    timer.stop();
    assert!(stop_called.elapsed() < Duration::from_millis(500));
    assert_eq!(log.count(), 0);
}

#[test]
fn test_restart_anchors_fresh_schedule() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());
    let interval = Duration::from_millis(60);

    timer.start(interval).unwrap();
    assert!(log.wait_for(2, Duration::from_secs(2)));
    timer.stop();
    let before_restart = log.count();

    let restarted = Instant::now();
    timer.start(interval).unwrap();
    assert!(log.wait_for(before_restart + 1, Duration::from_secs(2)));
    timer.stop();

    // First tick of the new schedule comes one interval after the restart
    let first = log.starts()[before_restart];
    assert!(first - restarted >= interval - Duration::from_millis(5));
}
