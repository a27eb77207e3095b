//! Interruptible sleep until an absolute deadline.
//!
//! The scheduling loop parks on a condition variable with a timeout. The
//! running flag lives outside the mutex so it can be read without taking
//! the wait lock; the mutex only orders "flag cleared, then notify" against
//! "flag checked, then wait" so a stop request can never slip between the
//! check and the wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The deadline was reached with the flag still set.
    Elapsed,
    /// The flag was cleared before the deadline.
    Cancelled,
}

/// Wake primitive shared by the controller and the scheduling loop.
#[derive(Debug, Default)]
pub struct WakeSignal {
    lock: Mutex<()>,
    cvar: Condvar,
}

impl WakeSignal {
    /// Create a new wake signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `deadline` or until `running` is observed false.
    ///
    /// The flag is re-checked after every wakeup, spurious or not, and is
    /// checked before the deadline so a cleared flag always wins.
    pub fn wait_until(&self, deadline: Instant, running: &AtomicBool) -> WaitOutcome {
        let mut guard = lock_unpoisoned(&self.lock);
        loop {
            if !running.load(Ordering::Acquire) {
                return WaitOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Elapsed;
            }
            guard = self
                .cvar
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wake all waiters so they re-evaluate the flag.
    ///
    /// Callers clear the flag first, then notify.
    pub fn notify(&self) {
        let _guard = lock_unpoisoned(&self.lock);
        self.cvar.notify_all();
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
