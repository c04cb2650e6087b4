/*!
 * Retry logic with reconnect between attempts
 */

use std::time::Duration;

use crate::cancel::{CancelToken, SleepOutcome};
use crate::error::{FerryError, Result};

/// Execute one logical network operation with a bounded attempt budget.
///
/// Only transport failures are retried: each one triggers `reset` (so the
/// caller can close and reopen its connection) followed by a fixed,
/// interruptible backoff. Any completed response ends the loop immediately,
/// including application-level rejections, which would only be re-sent to be
/// rejected again.
pub fn with_reconnect<T, F, R>(
    attempts: u32,
    backoff: Duration,
    cancel: &CancelToken,
    mut reset: R,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    R: FnMut(),
{
    let mut last_error: Option<FerryError> = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            reset();
            tracing::warn!(attempt, attempts, "reconnecting after transport failure");
            if cancel.sleep(backoff) == SleepOutcome::Interrupted {
                return Err(FerryError::Interrupted);
            }
        }

        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transport() => {
                tracing::debug!(attempt, error = %e, "transport failure");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(FerryError::RetriesExhausted { attempts }))
}
