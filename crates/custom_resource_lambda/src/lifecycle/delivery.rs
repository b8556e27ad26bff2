use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use custom_resource_core::ResponsePayload;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapters::callback::{CallbackTransport, TransportError};

/// Once-only flag shared by the main path and the watchdog: whoever claims
/// it first is the only one allowed to transmit a response.
#[derive(Debug, Clone, Default)]
pub struct CompletionGuard {
    claimed: Arc<AtomicBool>,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for exactly one caller across all clones.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given (1-based) failed attempt: doubles each time.
    pub fn backoff_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("callback target rejected the response: {0}")]
    Rejected(String),
    #[error("callback target unreachable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered { attempts: u32 },
    /// Another path already answered this request.
    Suppressed,
}

#[derive(Clone)]
pub struct ResponseDelivery {
    transport: Arc<dyn CallbackTransport>,
    retry: RetryPolicy,
}

impl ResponseDelivery {
    pub fn new(transport: Arc<dyn CallbackTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub async fn send(
        &self,
        guard: &CompletionGuard,
        payload: &ResponsePayload,
        callback_url: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let body = payload.to_json_bytes()?;

        if !guard.try_claim() {
            debug!(
                status = payload.status.as_str(),
                "response already sent for this request; dropping duplicate"
            );
            return Ok(DeliveryReport::Suppressed);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.put(callback_url, body.clone()).await {
                Ok(()) => {
                    info!(
                        status = payload.status.as_str(),
                        physical_resource_id = payload.physical_resource_id.as_deref(),
                        attempts = attempt,
                        "response delivered"
                    );
                    return Ok(DeliveryReport::Delivered { attempts: attempt });
                }
                Err(TransportError::Permanent(message)) => {
                    return Err(DeliveryError::Rejected(message));
                }
                Err(TransportError::Transient(message)) => {
                    if attempt >= max_attempts {
                        return Err(DeliveryError::Exhausted {
                            attempts: attempt,
                            last_error: message,
                        });
                    }
                    let backoff = self.retry.backoff_after(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "transient failure delivering response; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
