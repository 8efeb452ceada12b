//! Retry state machine for the request executor.
//!
//! ```text
//! Idle ──▶ Attempting(n) ──ok────────────────────────▶ Succeeded(value)
//!              │  ▲
//!     failure  │  │ delay elapsed
//!   (n < max)  ▼  │
//!          BackingOff(n, delay)
//!              │
//!  failure (n == max) ───────────────────────────────▶ Failed(error)
//! ```
//!
//! Transitions are pure. The executor performs the network call while the
//! machine is `Attempting` and sleeps while it is `BackingOff`; those are the
//! only two suspension points. Dropping the executor future at either point
//! abandons the request.

use std::time::Duration;

use crate::config::RetryPolicy;

/// Why a single attempt did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// HTTP 429; carries the parsed `Retry-After`, if any.
    RateLimited {
        /// Server-directed delay.
        retry_after: Option<Duration>,
    },
    /// Any other failure (non-2xx status, transport error, undecodable body).
    Hard,
}

/// Executor state. `T` is the success payload, `E` the per-attempt error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState<T, E> {
    /// Nothing sent yet.
    Idle,
    /// Attempt `attempt` (1-indexed) is in flight.
    Attempting {
        /// Current attempt number.
        attempt: u32,
    },
    /// Waiting `delay` before attempt `attempt + 1`.
    BackingOff {
        /// Attempt that just failed.
        attempt: u32,
        /// How long to wait.
        delay: Duration,
    },
    /// An attempt succeeded.
    Succeeded {
        /// Attempt that succeeded.
        attempt: u32,
        /// Response payload.
        value: T,
    },
    /// The final allowed attempt failed.
    Failed {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        error: E,
    },
}

impl<T, E> RetryState<T, E> {
    /// Leave `Idle` and begin the first attempt.
    #[must_use]
    pub const fn first() -> Self {
        Self::Attempting { attempt: 1 }
    }

    /// Attempt `attempt` returned a payload.
    #[must_use]
    pub const fn after_success(attempt: u32, value: T) -> Self {
        Self::Succeeded { attempt, value }
    }

    /// Attempt `attempt` failed.
    ///
    /// A 429 waits for the server-directed delay; any other failure waits
    /// for the exponential backoff. The last allowed attempt fails outright.
    #[must_use]
    pub fn after_failure(
        attempt: u32,
        error: E,
        failure: AttemptFailure,
        policy: &RetryPolicy,
    ) -> Self {
        if attempt >= policy.max_attempts.max(1) {
            return Self::Failed {
                attempts: attempt,
                error,
            };
        }

        let delay = match failure {
            AttemptFailure::RateLimited { retry_after } => policy.rate_limit_backoff(retry_after),
            AttemptFailure::Hard => policy.backoff_delay(attempt),
        };
        Self::BackingOff { attempt, delay }
    }

    /// The back-off after attempt `attempt` elapsed; begin the next attempt.
    #[must_use]
    pub const fn after_backoff(attempt: u32) -> Self {
        Self::Attempting {
            attempt: attempt + 1,
        }
    }

    /// Whether the machine reached `Succeeded` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}
