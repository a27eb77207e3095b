//! Demo tick handlers.
//!
//! Each handler stands in for a real periodic job and burns a variable
//! amount of time per tick so the timer's drift compensation is visible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use timer_runtime::TickHandler;

fn wall_clock() -> String {
    humantime::format_rfc3339_millis(SystemTime::now()).to_string()
}

/// Prints a timestamp per tick with a work time cycling 20, 30, ..., 90, 0, 10 ms.
pub struct TimeLogger {
    count: u64,
    work: Duration,
    simulate_work: bool,
}

impl TimeLogger {
    const WORK_STEP: Duration = Duration::from_millis(10);
    const WORK_WRAP: Duration = Duration::from_millis(100);

    pub fn new(simulate_work: bool) -> Self {
        Self {
            count: 0,
            work: Duration::from_millis(20),
            simulate_work,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl TickHandler for TimeLogger {
    fn on_tick(&mut self) {
        self.count += 1;
        println!(
            "tick {:>4} | {} | simulated work {:>3}ms",
            self.count,
            wall_clock(),
            self.work.as_millis()
        );

        if self.simulate_work {
            thread::sleep(self.work);
        }

        self.work += Self::WORK_STEP;
        if self.work >= Self::WORK_WRAP {
            self.work -= Self::WORK_WRAP;
        }
    }
}

/// Prints a timestamp per tick, then performs a random 10-200 ms workload.
pub struct TimestampPrinter {
    count: u64,
    rng: StdRng,
    simulate_work: bool,
}

impl TimestampPrinter {
    pub fn new(simulate_work: bool) -> Self {
        Self {
            count: 0,
            rng: StdRng::from_entropy(),
            simulate_work,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl TickHandler for TimestampPrinter {
    fn on_tick(&mut self) {
        self.count += 1;
        let workload = Duration::from_millis(self.rng.gen_range(10..=200));
        println!(
            "tick {:>4} | {} | workload {:>3}ms",
            self.count,
            wall_clock(),
            workload.as_millis()
        );

        if self.simulate_work {
            thread::sleep(workload);
        }
    }
}

/// Statistics gathered by [`SensorCollector`].
#[derive(Debug, Clone, Serialize)]
pub struct SensorSummary {
    /// Number of samples taken.
    pub samples: u64,
    /// Mean absolute deviation of the sample spacing from the interval.
    pub mean_jitter_ms: f64,
    /// Mean temperature in degrees Celsius.
    pub temperature_mean: Option<f64>,
    /// Population standard deviation of the temperature.
    pub temperature_stddev: Option<f64>,
}

/// Samples a simulated temperature sensor and tracks sampling jitter.
pub struct SensorCollector {
    interval: Duration,
    started: Instant,
    last_sample: Instant,
    total_jitter_ms: f64,
    temperatures: Vec<f64>,
    rng: StdRng,
    simulate_work: bool,
}

impl SensorCollector {
    const MEAN_CELSIUS: f64 = 25.0;
    const STDDEV_CELSIUS: f64 = 2.0;
    const BASE_PROCESSING: Duration = Duration::from_millis(20);
    const PROCESSING_RATE: f64 = 0.5;
    const PROCESSING_SCALE_MS: f64 = 130.0;

    /// Create a collector expecting one sample per `interval`.
    ///
    /// Jitter is measured from construction, so build the collector right
    /// before starting its timer.
    pub fn new(interval: Duration, simulate_work: bool) -> Self {
        let now = Instant::now();
        Self {
            interval,
            started: now,
            last_sample: now,
            total_jitter_ms: 0.0,
            temperatures: Vec::new(),
            rng: StdRng::from_entropy(),
            simulate_work,
        }
    }

    /// Normal(25, 2) via Box-Muller.
    fn read_temperature(&mut self) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        Self::MEAN_CELSIUS + Self::STDDEV_CELSIUS * z
    }

    /// 20 ms plus an exponentially distributed tail.
    fn processing_time(&mut self) -> Duration {
        let u: f64 = 1.0 - self.rng.gen::<f64>();
        let tail = -u.ln() / Self::PROCESSING_RATE;
        Self::BASE_PROCESSING + Duration::from_secs_f64(tail * Self::PROCESSING_SCALE_MS / 1000.0)
    }

    pub fn summary(&self) -> SensorSummary {
        let samples = self.temperatures.len() as u64;
        #[allow(clippy::cast_precision_loss)]
        let n = self.temperatures.len() as f64;

        let mean = (samples > 0).then(|| self.temperatures.iter().sum::<f64>() / n);
        let stddev = mean.map(|mean| {
            let sq_sum: f64 = self.temperatures.iter().map(|t| (t - mean).powi(2)).sum();
            (sq_sum / n).sqrt()
        });

        SensorSummary {
            samples,
            mean_jitter_ms: if samples > 0 {
                self.total_jitter_ms / n
            } else {
                0.0
            },
            temperature_mean: mean,
            temperature_stddev: stddev,
        }
    }
}

impl TickHandler for SensorCollector {
    fn on_tick(&mut self) {
        let now = Instant::now();
        let actual = now.duration_since(self.last_sample);
        let jitter_ms = (actual.as_secs_f64() - self.interval.as_secs_f64()).abs() * 1000.0;
        self.total_jitter_ms += jitter_ms;
        self.last_sample = now;

        let temperature = self.read_temperature();
        self.temperatures.push(temperature);

        println!(
            "sample {:>4} (t+{:>3}s): temperature = {:.2}°C (jitter: {:.2}ms)",
            self.temperatures.len(),
            now.duration_since(self.started).as_secs(),
            temperature,
            jitter_ms
        );

        let processing = self.processing_time();
        if self.simulate_work {
            thread::sleep(processing);
        }
    }
}
