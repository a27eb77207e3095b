use thiserror::Error;

/// Timer error types covering configuration, lifecycle, and callback failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimerError {
    /// The interval is not a positive duration.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// A start was requested without an interval and none was configured.
    #[error("no interval configured")]
    IntervalUnset,

    /// Configuration value rejected during validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The dedicated timer thread could not be created.
    #[error("failed to spawn timer thread: {0}")]
    Spawn(String),

    /// A lifecycle call was made from the timer's own thread that would deadlock.
    #[error("reentrant lifecycle call: {0}")]
    Reentrant(String),

    /// The tick handler panicked.
    #[error("tick handler panicked on tick {tick}: {message}")]
    HandlerPanic {
        /// Tick number (1-based) on which the panic occurred.
        tick: u64,
        /// Panic payload rendered as text.
        message: String,
    },
}

/// Convenience type alias for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;
