//! Proactive refresh timer
//!
//! One cancellable one-shot timer per process. Re-arming replaces the
//! previous timer, so overlapping schedules can never stack refreshes.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Safety margin: refresh this many seconds before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 30;

/// How long to wait before proactively refreshing a token that lives for
/// `expires_in` seconds. Saturates at zero: an already-stale token is
/// refreshed immediately.
#[must_use]
pub fn refresh_delay(expires_in: i64) -> Duration {
    Duration::from_secs((expires_in - REFRESH_MARGIN_SECS).max(0) as u64)
}

/// Owner of the single pending refresh timer.
///
/// `arm` aborts the previously armed task; a caller re-arming from inside
/// the fired task must do so as its final awaited-free step, since the abort
/// lands at that task's next await point.
pub struct RefreshScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self { pending: Mutex::new(None) }
    }

    /// Arm the timer: after `delay`, run `task`. Any previously armed timer
    /// is cancelled; the most recent call wins.
    pub fn arm<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(delay_secs = delay.as_secs(), "arming refresh timer");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            debug!("cancelling refresh timer");
            handle.abort();
        }
    }

    /// Whether a timer is currently armed and has not finished.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}
