//! Drift-compensating periodic timer.
//!
//! A [`PreciseTimer`] owns at most one dedicated thread. Each iteration of
//! that thread's loop:
//! 1. Sleeps until the next absolute wake time, or until stopped
//! 2. Runs the tick handler to completion
//! 3. Measures the handler and records tick metrics
//! 4. Asks the [`DriftCompensator`] for the next wake time
//!
//! `stop()` clears the running flag, wakes the sleeping loop, and joins the
//! thread. A handler already running is allowed to finish; no tick starts
//! after `stop()` returns. Dropping the timer stops it.

use crate::compensator::{Advance, DriftCompensator};
use crate::handler::TickHandler;
use crate::signal::{lock_unpoisoned, WaitOutcome, WakeSignal};
use crossbeam_utils::CachePadded;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use timer_common::config::{validate_interval, FaultPolicy, TimerConfig};
use timer_common::error::{TimerError, TimerResult};
use timer_common::metrics::{MetricsSnapshot, TickMetrics, TickSample};
use timer_common::state::TimerState;
use tracing::{debug, error, info, trace, warn};

/// State shared between the controlling side and the timer thread.
#[derive(Debug)]
struct Shared {
    /// Whether another tick should occur.
    running: CachePadded<AtomicBool>,
    /// Current interval in nanoseconds (0 = unset).
    interval_ns: CachePadded<AtomicU64>,
    /// Wakes the loop out of its timed wait.
    wake: WakeSignal,
    /// Tick metrics, written by the loop.
    metrics: Mutex<TickMetrics>,
    /// Most recent handler fault.
    last_fault: Mutex<Option<TimerError>>,
    /// Id of the thread currently running the loop.
    loop_thread: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn interval(&self) -> Option<Duration> {
        match self.interval_ns.load(Ordering::Acquire) {
            0 => None,
            ns => Some(Duration::from_nanos(ns)),
        }
    }

    fn store_interval(&self, interval: Duration) {
        let ns = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
        self.interval_ns.store(ns, Ordering::Release);
    }

    fn is_loop_thread(&self) -> bool {
        *lock_unpoisoned(&self.loop_thread) == Some(thread::current().id())
    }
}

/// Loop parameters fixed for one start/stop cycle.
#[derive(Debug, Clone, Copy)]
struct LoopSettings {
    overrun_offset: Duration,
    fault_policy: FaultPolicy,
    metrics_enabled: bool,
}

/// Periodic timer that invokes a [`TickHandler`] at a fixed interval.
///
/// All control methods take `&self`, so a timer can be shared behind an
/// `Arc` and controlled from any thread.
pub struct PreciseTimer<H: TickHandler> {
    shared: Arc<Shared>,
    handler: Arc<Mutex<H>>,
    /// Handle of the timer thread; held while running and until reaped.
    worker: Mutex<Option<JoinHandle<()>>>,
    overrun_offset: Duration,
    fault_policy: FaultPolicy,
    metrics_enabled: bool,
    thread_name: String,
}

impl<H: TickHandler> std::fmt::Debug for PreciseTimer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreciseTimer")
            .field("state", &self.state())
            .field("interval", &self.interval())
            .field("overrun_offset", &self.overrun_offset)
            .field("fault_policy", &self.fault_policy)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

impl<H: TickHandler> PreciseTimer<H> {
    /// Create a stopped timer with default configuration and no interval.
    pub fn new(handler: H) -> Self {
        Self::from_valid_config(handler, &TimerConfig::default())
    }

    /// Create a stopped timer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_config(handler: H, config: &TimerConfig) -> TimerResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(handler, config))
    }

    fn from_valid_config(handler: H, config: &TimerConfig) -> Self {
        let interval = config.interval.unwrap_or(Duration::ZERO);
        let shared = Shared {
            running: CachePadded::new(AtomicBool::new(false)),
            interval_ns: CachePadded::new(AtomicU64::new(0)),
            wake: WakeSignal::new(),
            metrics: Mutex::new(TickMetrics::new(config.metrics.histogram_size, interval)),
            last_fault: Mutex::new(None),
            loop_thread: Mutex::new(None),
        };
        shared.store_interval(interval);

        Self {
            shared: Arc::new(shared),
            handler: Arc::new(Mutex::new(handler)),
            worker: Mutex::new(None),
            overrun_offset: config.overrun_offset,
            fault_policy: config.fault_policy,
            metrics_enabled: config.metrics.enabled,
            thread_name: config.thread_name.clone(),
        }
    }

    /// Start ticking every `interval`, the first tick one interval from now.
    ///
    /// Does nothing if the timer is already running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] for a zero interval,
    /// [`TimerError::Reentrant`] when called from the handler of a timer that
    /// stopped itself, and [`TimerError::Spawn`] if the thread cannot be created.
    /// The timer stays stopped on error.
    pub fn start(&self, interval: Duration) -> TimerResult<()> {
        validate_interval(interval)?;

        if self.shared.is_loop_thread() {
            if self.is_running() {
                return Ok(());
            }
            return Err(TimerError::Reentrant(
                "cannot restart a timer from its own tick handler".into(),
            ));
        }

        let mut worker = lock_unpoisoned(&self.worker);

        let state = self.state();
        if !state.can_transition_to(TimerState::Running) {
            debug!(%state, "Timer already running, start ignored");
            return Ok(());
        }

        // A loop that ended on a handler fault leaves its handle behind
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        self.shared.store_interval(interval);

        let shared = Arc::clone(&self.shared);
        let handler = Arc::clone(&self.handler);
        let settings = LoopSettings {
            overrun_offset: self.overrun_offset,
            fault_policy: self.fault_policy,
            metrics_enabled: self.metrics_enabled,
        };

        // Set running BEFORE spawn so is_running() returns true immediately
        self.shared.running.store(true, Ordering::Release);
        let anchor = Instant::now();

        let handle = match thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_loop(&shared, &handler, anchor, settings))
        {
            Ok(h) => h,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(TimerError::Spawn(e.to_string()));
            }
        };

        *worker = Some(handle);

        info!(
            interval_us = interval.as_micros(),
            thread = %self.thread_name,
            "Timer started"
        );
        Ok(())
    }

    /// Start with the interval given at construction or by [`set_interval`](Self::set_interval).
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::IntervalUnset`] if no interval is known, otherwise
    /// the errors of [`start`](Self::start).
    pub fn start_configured(&self) -> TimerResult<()> {
        let interval = self.shared.interval().ok_or(TimerError::IntervalUnset)?;
        self.start(interval)
    }

    /// Stop ticking and wait for the timer thread to exit.
    ///
    /// Does nothing if the timer is not running. A handler that is mid-tick
    /// finishes first. Called from inside the handler, this only clears the
    /// running flag; the loop exits when the handler returns.
    pub fn stop(&self) {
        if self.shared.is_loop_thread() {
            if self.shared.running.swap(false, Ordering::AcqRel) {
                debug!("Stop requested from tick handler");
            }
            return;
        }

        let mut worker = lock_unpoisoned(&self.worker);

        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        self.shared.wake.notify();

        if let Some(handle) = worker.take() {
            join_worker(handle);
        }

        let from = TimerState::from(was_running);
        if from.can_transition_to(TimerState::Stopped) {
            info!(%from, "Timer stopped");
        }
    }

    /// Stop, then start again with a fresh schedule anchored at now.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`start`](Self::start).
    pub fn restart(&self, interval: Duration) -> TimerResult<()> {
        validate_interval(interval)?;
        self.stop();
        self.start(interval)
    }

    /// Change the interval.
    ///
    /// On a running timer the new interval applies from the next computed
    /// wake time; the tick already scheduled keeps its wake time. On a
    /// stopped timer it becomes the interval used by
    /// [`start_configured`](Self::start_configured).
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] for a zero interval.
    pub fn set_interval(&self, interval: Duration) -> TimerResult<()> {
        validate_interval(interval)?;
        self.shared.store_interval(interval);
        debug!(interval_us = interval.as_micros(), "Timer interval updated");
        Ok(())
    }

    /// Current interval, if one has been set.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.shared.interval()
    }

    /// Check if the timer is running. Never blocks.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TimerState {
        TimerState::from(self.is_running())
    }

    /// Snapshot of the tick metrics, cumulative across start/stop cycles.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        lock_unpoisoned(&self.shared.metrics).snapshot()
    }

    /// Execution-time percentiles over the retained samples.
    #[must_use]
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<(f64, Duration)> {
        lock_unpoisoned(&self.shared.metrics).percentiles(percentiles)
    }

    /// Most recent handler fault, if any.
    #[must_use]
    pub fn last_fault(&self) -> Option<TimerError> {
        lock_unpoisoned(&self.shared.last_fault).clone()
    }

    /// Policy applied when the handler panics.
    #[must_use]
    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    /// Lock the handler, e.g. to read collected data after stopping.
    ///
    /// While the guard is held no tick can run. Calling this from inside the
    /// handler deadlocks.
    pub fn handler(&self) -> MutexGuard<'_, H> {
        lock_unpoisoned(&self.handler)
    }
}

impl<H: TickHandler> Drop for PreciseTimer<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(e) = handle.join() {
        warn!("Timer thread panicked: {:?}", e);
    }
}

/// Body of the timer thread.
fn run_loop<H: TickHandler>(
    shared: &Shared,
    handler: &Mutex<H>,
    anchor: Instant,
    settings: LoopSettings,
) {
    *lock_unpoisoned(&shared.loop_thread) = Some(thread::current().id());

    // start() stores a valid interval before spawning
    let interval = shared.interval().unwrap_or(Duration::from_nanos(1));
    let mut compensator = DriftCompensator::new(anchor, interval, settings.overrun_offset);
    let mut tick: u64 = 0;

    debug!(interval_us = interval.as_micros(), "Timer thread started");

    loop {
        let scheduled = compensator.next_wake();
        if shared.wake.wait_until(scheduled, &shared.running) == WaitOutcome::Cancelled {
            break;
        }

        tick += 1;
        let start = Instant::now();
        let outcome = invoke(handler);
        let end = Instant::now();
        let execution = end - start;

        let interval = shared.interval().unwrap_or(interval);
        let advance = compensator.advance(interval, end);

        if settings.metrics_enabled {
            let mut metrics = lock_unpoisoned(&shared.metrics);
            metrics.set_interval(interval);
            metrics.record(TickSample {
                execution,
                lateness: start.saturating_duration_since(scheduled),
                coalesced: advance.is_coalesced(),
                faulted: outcome.is_err(),
            });
        }

        match advance {
            Advance::OnSchedule(_) => trace!(
                tick,
                execution_us = execution.as_micros(),
                "Tick complete"
            ),
            Advance::Coalesced { missed, .. } => warn!(
                tick,
                execution_us = execution.as_micros(),
                interval_us = interval.as_micros(),
                missed,
                "Tick overran its interval, coalescing missed ticks"
            ),
        }

        if let Err(message) = outcome {
            error!(tick, policy = %settings.fault_policy, %message, "Tick handler panicked");
            *lock_unpoisoned(&shared.last_fault) = Some(TimerError::HandlerPanic { tick, message });

            if settings.fault_policy == FaultPolicy::Stop {
                shared.running.store(false, Ordering::Release);
                break;
            }
        }
    }

    *lock_unpoisoned(&shared.loop_thread) = None;
    debug!(ticks = tick, "Timer thread exited");
}

/// Run one tick, catching a handler panic before the handler lock is released.
fn invoke<H: TickHandler>(handler: &Mutex<H>) -> Result<(), String> {
    let mut guard = lock_unpoisoned(handler);
    panic::catch_unwind(AssertUnwindSafe(|| guard.on_tick()))
        .map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for configuring a timer.
pub struct TimerBuilder<H: TickHandler> {
    handler: H,
    config: TimerConfig,
}

impl<H: TickHandler> TimerBuilder<H> {
    /// Create a new builder with the given handler.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            config: TimerConfig::default(),
        }
    }

    /// Set the initial interval used by `start_configured`.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = Some(interval);
        self
    }

    /// Set the offset applied after an overrunning tick.
    #[must_use]
    pub fn overrun_offset(mut self, offset: Duration) -> Self {
        self.config.overrun_offset = offset;
        self
    }

    /// Set the handler fault policy.
    #[must_use]
    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.config.fault_policy = policy;
        self
    }

    /// Set the timer thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the full timer configuration.
    #[must_use]
    pub fn config(mut self, config: TimerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn build(self) -> TimerResult<PreciseTimer<H>> {
        PreciseTimer::with_config(self.handler, &self.config)
    }
}
