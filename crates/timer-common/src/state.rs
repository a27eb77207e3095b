//! Timer lifecycle states.
//!
//! A timer has exactly two states: `Stopped` and `Running`. There is no
//! paused or faulted state; a handler fault under the stop policy simply
//! returns the timer to `Stopped`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    /// No timer thread exists, or the existing one is exiting.
    #[default]
    Stopped,
    /// The timer thread is scheduling ticks.
    Running,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "STOPPED"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}

impl From<bool> for TimerState {
    fn from(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

impl TimerState {
    /// Check whether moving to `target` changes anything.
    ///
    /// Requests that would leave the state unchanged (start while running,
    /// stop while stopped) are no-ops rather than errors.
    #[must_use]
    pub fn can_transition_to(&self, target: TimerState) -> bool {
        *self != target
    }

    /// Returns true if the timer is scheduling ticks.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}
