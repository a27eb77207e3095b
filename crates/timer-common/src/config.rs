//! Configuration structures for the precise timer.
//!
//! Supports TOML deserialization with sensible defaults. Durations are
//! written in humantime format (`"100ms"`, `"1s 500ms"`).

use crate::error::{TimerError, TimerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default offset used to re-anchor the schedule after an overrun.
pub const DEFAULT_OVERRUN_OFFSET: Duration = Duration::from_millis(1);

/// Default name given to the timer thread.
pub const DEFAULT_THREAD_NAME: &str = "precise-timer";

/// Top-level timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Nominal tick interval used by `start_configured`.
    #[serde(with = "humantime_serde_opt", skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,

    /// Offset added to the end of an overrunning tick to schedule the next one.
    #[serde(with = "humantime_serde")]
    pub overrun_offset: Duration,

    /// Name of the dedicated timer thread.
    pub thread_name: String,

    /// What to do when the tick handler panics.
    pub fault_policy: FaultPolicy,

    /// Tick metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval: None,
            overrun_offset: DEFAULT_OVERRUN_OFFSET,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            fault_policy: FaultPolicy::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Policy for handling a panicking tick handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Stop the timer after the faulting tick.
    #[default]
    Stop,
    /// Log the fault and keep ticking.
    Continue,
}

impl std::fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultPolicy::Stop => write!(f, "stop"),
            FaultPolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Tick metrics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Size of the execution-time ring buffer.
    pub histogram_size: usize,

    /// Percentiles to report (e.g., [50, 90, 99]).
    pub percentiles: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 1_000,
            percentiles: vec![50.0, 90.0, 99.0],
        }
    }
}

impl TimerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check the configuration for values the timer cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidInterval`] for a zero interval and
    /// [`TimerError::Config`] for a zero overrun offset or an empty thread name.
    pub fn validate(&self) -> TimerResult<()> {
        if let Some(interval) = self.interval {
            validate_interval(interval)?;
            if self.overrun_offset > interval {
                warn!(
                    overrun_offset_us = self.overrun_offset.as_micros(),
                    interval_us = interval.as_micros(),
                    "Overrun offset exceeds interval; it will be capped at the interval"
                );
            }
        }
        if self.overrun_offset.is_zero() {
            return Err(TimerError::Config("overrun_offset must be positive".into()));
        }
        if self.thread_name.is_empty() {
            return Err(TimerError::Config("thread_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Reject intervals the scheduler cannot make progress with.
///
/// # Errors
///
/// Returns [`TimerError::InvalidInterval`] if `interval` is zero.
pub fn validate_interval(interval: Duration) -> TimerResult<()> {
    if interval.is_zero() {
        return Err(TimerError::InvalidInterval(
            "interval must be greater than zero".into(),
        ));
    }
    Ok(())
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Same as `humantime_serde`, for optional durations.
mod humantime_serde_opt {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
