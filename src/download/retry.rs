//! Bounded retry with exponential backoff
//!
//! Shared by app downloads, version checks and the update download. Only
//! transient failures (see `DartsHubError::is_transient`) are retried; every
//! retry is announced on the bus so the UI can show "retrying in 4s".

use crate::download::cancel::CancellationToken;
use crate::error::{DartsHubError, Result};
use crate::events::{EventBus, HubEvent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Retry ceiling and backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_backoff_ms: u64,
    /// Upper bound for any single wait
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 1000,
            max_backoff_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1` (1-based `attempt`)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out
pub fn retry<T, F>(
    policy: &RetryPolicy,
    subject: &str,
    bus: &EventBus,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(DartsHubError::Cancelled(subject.to_string()));
        }

        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "{subject}: attempt {attempt}/{max_attempts} failed ({e}), retrying in {}ms",
                    backoff.as_millis()
                );
                bus.publish(HubEvent::RetryProgress {
                    subject: subject.to_string(),
                    attempt,
                    max_attempts,
                    backoff_ms: u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                });
                if !cancel.sleep(backoff) {
                    return Err(DartsHubError::Cancelled(subject.to_string()));
                }
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    info!("{subject}: giving up after {attempt} attempts");
                }
                return Err(e);
            }
        }
    }
}
