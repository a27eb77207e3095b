//! Tick metrics collection for timer health monitoring.
//!
//! Tracks how long the tick handler runs, how late each tick started
//! relative to its scheduled wake time, and how often the schedule had
//! to be re-anchored after an overrun. Execution times are kept in a
//! fixed-size ring buffer so percentiles cost no allocation per tick.

use std::time::Duration;

/// Measurements taken for one tick by the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSample {
    /// Time spent inside the tick handler.
    pub execution: Duration,
    /// Delay between the scheduled wake time and the actual handler start.
    pub lateness: Duration,
    /// Whether the following wake time was re-anchored after an overrun.
    pub coalesced: bool,
    /// Whether the handler panicked.
    pub faulted: bool,
}

/// Tick metrics with a ring buffer of handler execution times.
#[derive(Debug)]
pub struct TickMetrics {
    /// Ring buffer of execution times in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total ticks recorded.
    total_ticks: u64,
    /// Minimum observed execution time in nanoseconds.
    min_ns: u64,
    /// Maximum observed execution time in nanoseconds.
    max_ns: u64,
    /// Sum of all execution times for mean calculation.
    sum_ns: u64,
    /// Maximum observed wake lateness in nanoseconds.
    max_lateness_ns: u64,
    /// Sum of wake lateness for mean calculation.
    sum_lateness_ns: u64,
    /// Ticks whose execution exceeded the interval.
    overrun_count: u64,
    /// Ticks after which the schedule was re-anchored.
    coalesced_count: u64,
    /// Ticks on which the handler panicked.
    fault_count: u64,
    /// Current interval in nanoseconds.
    interval_ns: u64,
}

impl TickMetrics {
    /// Create a new metrics collector.
    ///
    /// # Arguments
    ///
    /// * `histogram_size` - Number of execution samples to retain.
    /// * `interval` - Nominal tick interval; executions exceeding it are overruns.
    #[must_use]
    pub fn new(histogram_size: usize, interval: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_ticks: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            max_lateness_ns: 0,
            sum_lateness_ns: 0,
            overrun_count: 0,
            coalesced_count: 0,
            fault_count: 0,
            interval_ns: duration_ns(interval),
        }
    }

    /// Update the interval used to classify overruns.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval_ns = duration_ns(interval);
    }

    /// Record one tick.
    pub fn record(&mut self, sample: TickSample) {
        let ns = duration_ns(sample.execution);
        let lateness_ns = duration_ns(sample.lateness);

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_ticks += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);
        self.max_lateness_ns = self.max_lateness_ns.max(lateness_ns);
        self.sum_lateness_ns = self.sum_lateness_ns.wrapping_add(lateness_ns);

        if ns > self.interval_ns {
            self.overrun_count += 1;
        }
        if sample.coalesced {
            self.coalesced_count += 1;
        }
        if sample.faulted {
            self.fault_count += 1;
        }
    }

    /// Get total number of ticks recorded.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Get minimum observed execution time.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Get maximum observed execution time.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Get mean execution time.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.sum_ns / self.total_ticks))
    }

    /// Get mean wake lateness.
    #[must_use]
    pub fn mean_lateness(&self) -> Option<Duration> {
        (self.total_ticks > 0)
            .then(|| Duration::from_nanos(self.sum_lateness_ns / self.total_ticks))
    }

    /// Get number of ticks whose execution exceeded the interval.
    #[must_use]
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Get number of schedule re-anchors after overruns.
    #[must_use]
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count
    }

    /// Get number of ticks on which the handler panicked.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Compute an execution-time percentile from the ring buffer.
    ///
    /// Returns `None` if no samples have been collected or if percentile is out of range.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        self.percentiles(&[percentile]).first().map(|&(_, d)| d)
    }

    /// Compute multiple percentiles with a single sort.
    ///
    /// Invalid percentiles (< 0, > 100, or NaN) are skipped.
    #[must_use]
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<(f64, Duration)> {
        if self.sample_count == 0 {
            return vec![];
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        percentiles
            .iter()
            .filter(|&&p| (0.0..=100.0).contains(&p))
            .map(|&p| (p, Duration::from_nanos(sorted[rank(p, sorted.len())])))
            .collect()
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let recorded = self.total_ticks > 0;
        MetricsSnapshot {
            total_ticks: self.total_ticks,
            min_ns: recorded.then_some(self.min_ns),
            max_ns: recorded.then_some(self.max_ns),
            mean_ns: recorded.then(|| self.sum_ns / self.total_ticks),
            mean_lateness_ns: recorded.then(|| self.sum_lateness_ns / self.total_ticks),
            max_lateness_ns: recorded.then_some(self.max_lateness_ns),
            overrun_count: self.overrun_count,
            coalesced_count: self.coalesced_count,
            fault_count: self.fault_count,
            interval_ns: self.interval_ns,
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state, keeping the interval.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_ticks = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.max_lateness_ns = 0;
        self.sum_lateness_ns = 0;
        self.overrun_count = 0;
        self.coalesced_count = 0;
        self.fault_count = 0;
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn rank(percentile: f64, len: usize) -> usize {
    let idx = ((percentile / 100.0) * (len - 1) as f64).round() as usize;
    idx.min(len - 1)
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total ticks recorded.
    pub total_ticks: u64,
    /// Minimum handler execution time in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum handler execution time in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean handler execution time in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Mean wake lateness in nanoseconds.
    pub mean_lateness_ns: Option<u64>,
    /// Maximum wake lateness in nanoseconds.
    pub max_lateness_ns: Option<u64>,
    /// Ticks whose execution exceeded the interval.
    pub overrun_count: u64,
    /// Schedule re-anchors after overruns.
    pub coalesced_count: u64,
    /// Ticks on which the handler panicked.
    pub fault_count: u64,
    /// Interval in effect when the snapshot was taken.
    pub interval_ns: u64,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get execution jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
