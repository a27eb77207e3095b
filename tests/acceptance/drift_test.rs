//! Drift compensation acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - With handler work under 10% of the interval, the mean period stays
//!   within 3% of the interval
//! - Phase error relative to the ideal schedule stays bounded as ticks
//!   accumulate
//! - `set_interval` changes the period from the next computed tick on

use super::common::{abs_diff, max_phase_error, mean, periods, TickLog};
use std::thread;
use std::time::{Duration, Instant};
use timer_runtime::PreciseTimer;

#[test]
fn test_mean_period_tracks_interval_under_light_load() {
    let interval = Duration::from_millis(20);
    let log = TickLog::new();
    // 1.9ms of work per tick: end-relative scheduling would average ~21.9ms
    let timer = PreciseTimer::new(log.handler(|_| Duration::from_micros(1_900)));

    timer.start(interval).unwrap();
    assert!(log.wait_for(61, Duration::from_secs(5)));
    timer.stop();

    let starts = log.starts();
    let starts = &starts[..61];
    let mean_period = mean(&periods(starts));

    assert!(
        abs_diff(mean_period, interval) < interval * 3 / 100,
        "mean period {mean_period:?} drifted from {interval:?}"
    );
}

#[test]
fn test_phase_error_does_not_grow() {
    let interval = Duration::from_millis(15);
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.handler(|i| Duration::from_micros(500 + (i as u64 % 3) * 400)));

    timer.start(interval).unwrap();
    assert!(log.wait_for(81, Duration::from_secs(5)));
    timer.stop();

    let starts = log.starts();
    let early = max_phase_error(&starts[..21], interval);
    let late = max_phase_error(&starts[..81], interval);

    // Without compensation the error after 80 ticks would be ~70ms
    assert!(late < Duration::from_millis(8), "phase error {late:?} after 80 ticks");
    assert!(
        late <= early + Duration::from_millis(6),
        "phase error grew from {early:?} to {late:?}"
    );
}

#[test]
fn test_set_interval_changes_period_from_next_tick() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.start(Duration::from_millis(10)).unwrap();
    assert!(log.wait_for(6, Duration::from_secs(2)));

    let changed_at = Instant::now();
    timer.set_interval(Duration::from_millis(40)).unwrap();
    assert!(timer.is_running());
    thread::sleep(Duration::from_millis(300));
    timer.stop();

    let starts = log.starts();
    let (before, after): (Vec<Instant>, Vec<Instant>) =
        starts.iter().copied().partition(|&t| t < changed_at);

    let before_mean = mean(&periods(&before));
    assert!(
        abs_diff(before_mean, Duration::from_millis(10)) < Duration::from_millis(3),
        "period before change was {before_mean:?}"
    );

    // The tick scheduled before the change keeps its wake time; every later
    // gap uses the new interval
    assert!(after.len() >= 5, "only {} ticks after change", after.len());
    assert!(after.len() <= 9, "{} ticks after change", after.len());
    for gap in periods(&after).into_iter().skip(1) {
        assert!(
            abs_diff(gap, Duration::from_millis(40)) < Duration::from_millis(8),
            "gap {gap:?} after interval change"
        );
    }
}

#[test]
fn test_set_interval_on_stopped_timer_applies_at_start() {
    let log = TickLog::new();
    let timer = PreciseTimer::new(log.idle_handler());

    timer.set_interval(Duration::from_millis(25)).unwrap();
    assert!(!timer.is_running());

    timer.start_configured().unwrap();
    assert!(log.wait_for(6, Duration::from_secs(2)));
    timer.stop();

    let starts = log.starts();
    let mean_period = mean(&periods(&starts[..6]));
    assert!(abs_diff(mean_period, Duration::from_millis(25)) < Duration::from_millis(3));
}
