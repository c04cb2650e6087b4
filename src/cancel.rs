/*!
 * Cooperative cancellation for blocking waits
 *
 * The engine suspends in exactly two places: the backoff sleep between retry
 * attempts and the pacing delay between catalog items. Both poll a shared
 * token so an external caller can interrupt the wait without tearing down an
 * in-flight network call.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polling granularity for interruptible sleeps
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared cancellation flag, cheap to clone across components
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

/// Result of an interruptible wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    Interrupted,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation so the batch can resume
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking early if the token is cancelled
    pub fn sleep(&self, duration: Duration) -> SleepOutcome {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return SleepOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return SleepOutcome::Completed;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
