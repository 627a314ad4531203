//! Publishing with bounded retry.
//!
//! ```text
//!             submit ok, no errors
//! Attempting(n) ─────────────────────▶ Succeeded
//!     │  submit ok, errors reported
//!     ├──────────────────────────────▶ Rejected      (no retry: the request was processed)
//!     │  transport error, n < max
//!     ├── sleep(backoff) ──▶ Attempting(n + 1)
//!     │  transport error, n == max
//!     ├──────────────────────────────▶ Exhausted
//!     │  token cancelled / deadline passed
//!     └──────────────────────────────▶ Cancelled     (checked before each call and each sleep)
//! ```
//!
//! Every path ends in a [`PublishOutcome`]; transport errors never escape.
//! The identical request is retried each time.

use crate::config::{BackoffStrategy, PublishConfig};
use crate::endpoint::PostingEndpoint;
use crate::fetch::FetchedImage;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Terminal result of a publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Endpoint accepted the post; carries its response payload.
    Succeeded { payload: Value, attempts: u32 },
    /// Endpoint processed the request and refused it.
    Rejected { errors: Vec<String>, attempts: u32 },
    /// Every attempt failed in transit.
    Exhausted { reason: String, attempts: u32 },
    /// Stopped between attempts by the cancel token.
    Cancelled { reason: String, attempts: u32 },
}

impl PublishOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

// =============================================================================
// Backoff, sleeping, cancellation
// =============================================================================

/// Delay between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Constant(Duration),
    /// `base * 2^(n-1)` after the n-th failure, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn from_config(config: &PublishConfig) -> Self {
        let interval = Duration::from_secs(config.backoff.interval_secs);
        match config.backoff.strategy {
            BackoffStrategy::Constant => Self::Constant(interval),
            BackoffStrategy::Exponential => Self::Exponential {
                base: interval,
                max: Duration::from_secs(config.backoff.max_interval_secs),
            },
        }
    }

    /// Delay after the `attempt`-th (1-based) failure.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Constant(interval) => interval,
            Self::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Blocks the caller between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real sleeping on the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared stop signal, optionally with a wall-clock deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Why the token is tripped, if it is.
    pub fn tripped(&self) -> Option<&'static str> {
        if self.cancelled.load(Ordering::SeqCst) {
            Some("cancelled")
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some("deadline elapsed")
        } else {
            None
        }
    }
}

// =============================================================================
// Publisher
// =============================================================================

#[derive(Debug, Clone)]
pub struct Publisher {
    max_attempts: u32,
    backoff: Backoff,
}

impl Publisher {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(config.max_attempts, Backoff::from_config(config))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Submit `image` with `caption` and `alt_text`, retrying transport
    /// failures until success, rejection, exhaustion or cancellation.
    pub fn publish<E, S>(
        &self,
        endpoint: &E,
        image: &FetchedImage,
        caption: &str,
        alt_text: &str,
        sleeper: &S,
        cancel: &CancelToken,
    ) -> PublishOutcome
    where
        E: PostingEndpoint + ?Sized,
        S: Sleeper + ?Sized,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if let Some(reason) = cancel.tripped() {
                warn!(reason, attempts = attempt - 1, "publish cancelled");
                return PublishOutcome::Cancelled {
                    reason: reason.to_string(),
                    attempts: attempt - 1,
                };
            }

            info!(attempt, max_attempts = self.max_attempts, "publishing post");
            match endpoint.submit(image, caption, alt_text) {
                Ok(response) if response.is_accepted() => {
                    info!(attempt, "post accepted");
                    return PublishOutcome::Succeeded {
                        payload: response.payload,
                        attempts: attempt,
                    };
                }
                Ok(response) => {
                    warn!(attempt, errors = ?response.errors, "post rejected by endpoint");
                    return PublishOutcome::Rejected {
                        errors: response.errors,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    warn!(attempt, error = %err, "publish attempt failed");
                    last_error = err.to_string();
                }
            }

            if attempt < self.max_attempts {
                if let Some(reason) = cancel.tripped() {
                    warn!(reason, attempts = attempt, "publish cancelled");
                    return PublishOutcome::Cancelled {
                        reason: reason.to_string(),
                        attempts: attempt,
                    };
                }
                let delay = self.backoff.delay(attempt);
                info!(delay_secs = delay.as_secs_f64(), "backing off");
                sleeper.sleep(delay);
            }
        }

        warn!(attempts = self.max_attempts, reason = %last_error, "publish retries exhausted");
        PublishOutcome::Exhausted {
            reason: last_error,
            attempts: self.max_attempts,
        }
    }
}
