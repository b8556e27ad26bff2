use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Timer that fires shortly before the invocation deadline.
///
/// On expiry it runs the supplied action. If the action reports that it took
/// over the request, [`Watchdog::expired`] resolves so the caller can stop
/// waiting on the main path. Disarming (or dropping) the watchdog before it
/// fires guarantees the action never runs.
pub struct Watchdog {
    cancel: CancellationToken,
    expired: Arc<Notify>,
}

impl Watchdog {
    pub fn arm<F, Fut>(fire_in: Duration, on_expire: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let expired = Arc::new(Notify::new());

        let task_cancel = cancel.clone();
        let task_expired = Arc::clone(&expired);
        tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => {
                        debug!("watchdog disarmed");
                    }
                    _ = tokio::time::sleep(fire_in) => {
                        debug!(fire_in_ms = fire_in.as_millis() as u64, "watchdog fired");
                        if on_expire().await {
                            task_expired.notify_one();
                        }
                    }
                }
            }
            .in_current_span(),
        );

        Self { cancel, expired }
    }

    pub fn disarm(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the expiry action has taken over the request.
    pub async fn expired(&self) {
        self.expired.notified().await;
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Time left before the watchdog should fire.
pub fn fire_delay(remaining: Duration, margin: Duration) -> Duration {
    remaining.saturating_sub(margin)
}
