//! Signal handling for ending a demo run early.
//!
//! SIGINT and SIGTERM set an atomic flag; the main thread polls it while
//! the timer ticks on its own thread.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
static SIGNAL_COUNT: AtomicU32 = AtomicU32::new(0);

/// How often the waiting thread re-checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle for the process-wide shutdown flag.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler {
    _private: (),
}

impl SignalHandler {
    /// Register SIGINT/SIGTERM handlers.
    ///
    /// On non-Unix platforms the flag is never set and runs last their full duration.
    pub fn new() -> Self {
        #[cfg(unix)]
        register_unix_handlers();

        Self { _private: () }
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(self) -> bool {
        SHUTDOWN_FLAG.load(Ordering::Relaxed)
    }

    /// Number of signals received.
    pub fn signal_count(self) -> u32 {
        SIGNAL_COUNT.load(Ordering::Relaxed)
    }

    /// Block until `timeout` elapses or shutdown is requested.
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait_for_shutdown(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shutdown_requested() {
                info!("Shutdown signal received");
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(unix)]
fn register_unix_handlers() {
    use std::os::raw::c_int;

    extern "C" fn shutdown_handler(_: c_int) {
        SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
        SIGNAL_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    // SAFETY: the handler only touches atomics, which is async-signal-safe
    unsafe {
        libc::signal(libc::SIGINT, shutdown_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, shutdown_handler as libc::sighandler_t);
    }

    debug!("Unix signal handlers registered");
}
