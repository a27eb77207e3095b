//! End-of-run report for demo timers.

use serde::Serialize;
use std::time::Duration;
use timer_common::metrics::MetricsSnapshot;
use timer_common::state::TimerState;
use timer_runtime::{PreciseTimer, TickHandler};
use tracing::info;

/// Summary of one demo run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Demo name.
    pub demo: &'static str,
    /// Timer state after the run.
    pub state: TimerState,
    /// Wall time the demo was allowed to run.
    pub elapsed_ms: u64,
    /// Whether the run ended on a signal.
    pub interrupted: bool,
    /// Tick metrics.
    pub metrics: MetricsSnapshot,
    /// Execution-time percentiles as (percentile, nanoseconds).
    pub percentiles: Vec<(f64, u64)>,
    /// Demo-specific results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RunReport {
    /// Collect the report from a stopped timer.
    pub fn collect<H: TickHandler>(
        demo: &'static str,
        timer: &PreciseTimer<H>,
        elapsed: Duration,
        interrupted: bool,
        percentiles: &[f64],
    ) -> Self {
        let percentiles = timer
            .percentiles(percentiles)
            .into_iter()
            .map(|(p, d)| (p, u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)))
            .collect();

        Self {
            demo,
            state: timer.state(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            interrupted,
            metrics: timer.metrics(),
            percentiles,
            details: None,
        }
    }

    /// Attach demo-specific results.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Log the report through tracing.
    pub fn log(&self) {
        let m = &self.metrics;
        info!(
            demo = self.demo,
            final_state = %self.state,
            ticks = m.total_ticks,
            mean_exec_us = m.mean_ns.map_or(0, |ns| ns / 1_000),
            max_exec_us = m.max_ns.map_or(0, |ns| ns / 1_000),
            mean_lateness_us = m.mean_lateness_ns.map_or(0, |ns| ns / 1_000),
            overruns = m.overrun_count,
            coalesced = m.coalesced_count,
            faults = m.fault_count,
            interrupted = self.interrupted,
            "Run complete"
        );
        for (p, ns) in &self.percentiles {
            info!(percentile = p, exec_us = ns / 1_000, "Execution time percentile");
        }
    }
}
