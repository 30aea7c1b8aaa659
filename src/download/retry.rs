//! Retry policy engine for page fetch attempts.
//!
//! A [`RetryPolicy`] wraps a single network attempt with a backoff/retry
//! contract. The policy is a pure strategy object: it holds no mutable state,
//! so concurrently retrying tasks cannot interfere with each other, and the
//! delay schedule is independently testable.
//!
//! # Strategies
//!
//! - [`BackoffStrategy::None`] - single attempt, no retry
//! - [`BackoffStrategy::Fixed`] - constant delay between attempts
//! - [`BackoffStrategy::Linear`] - delay grows by a fixed increment
//! - [`BackoffStrategy::Exponential`] - delay multiplies per attempt, capped
//!
//! All retrying strategies add bounded random jitter so concurrently failing
//! workers do not retry in lockstep. Rate-limited responses are retryable
//! regardless of strategy and honor a server-supplied minimum wait: the delay
//! used is the maximum of the policy delay and the server-requested delay.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::error::FailureKind;

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Maximum jitter added to retrying strategies' delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Maximum honored Retry-After value (1 hour) to prevent excessive stalls.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Single attempt; failures propagate immediately.
    None,

    /// Constant delay before every retry.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },

    /// Delay grows by a fixed increment per attempt.
    Linear {
        /// Delay before the first retry.
        initial: Duration,
        /// Added to the delay after each further attempt.
        increment: Duration,
    },

    /// Delay multiplies by a fixed factor per attempt, capped at a maximum.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Multiplier applied per attempt (typically 2.0).
        multiplier: f64,
        /// Upper bound on the computed delay.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Computes the base delay (before jitter) after `attempt` failed.
    ///
    /// `attempt` is 1-indexed: the delay returned precedes attempt
    /// `attempt + 1`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::None => Duration::ZERO,

            Self::Fixed { delay } => delay,

            Self::Linear { initial, increment } => {
                initial + increment * attempt.saturating_sub(1)
            }

            Self::Exponential {
                base,
                multiplier,
                max,
            } => {
                let exponent = f64::from(attempt.saturating_sub(1));
                let delay_ms = base.as_millis() as f64 * multiplier.powf(exponent);
                let capped_ms = delay_ms.min(max.as_millis() as f64);
                Duration::from_millis(capped_ms as u64)
            }
        }
    }
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry {
        /// How long to suspend before retrying. Only the calling task
        /// sleeps; siblings are unaffected.
        delay: Duration,
        /// Which attempt number this will be (1-indexed).
        attempt: u32,
    },

    /// Do not retry.
    GiveUp {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry contract for one class of network operation.
///
/// Stateless and cheap to clone; one policy instance is shared by every page
/// task in a run.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    strategy: BackoffStrategy,
    max_attempts: u32,
    jitter: bool,
}

impl Default for RetryPolicy {
    /// Exponential backoff, 1s base doubling to a 32s cap, 3 attempts.
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential {
                base: Duration::from_secs(1),
                multiplier: 2.0,
                max: Duration::from_secs(32),
            },
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from a strategy and an attempt budget.
    ///
    /// `max_attempts` counts the initial attempt; it is clamped to at least
    /// one. A [`BackoffStrategy::None`] strategy always means exactly one
    /// attempt regardless of `max_attempts`.
    #[must_use]
    pub fn new(strategy: BackoffStrategy, max_attempts: u32) -> Self {
        let max_attempts = match strategy {
            BackoffStrategy::None => 1,
            _ => max_attempts.max(1),
        };
        Self {
            strategy,
            max_attempts,
            jitter: true,
        }
    }

    /// Single-attempt policy (`none` strategy).
    #[must_use]
    pub fn none() -> Self {
        Self::new(BackoffStrategy::None, 1)
    }

    /// Disables jitter. Intended for tests that assert exact delays.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Returns the configured attempt budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the configured strategy.
    #[must_use]
    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    /// Decides whether to retry after attempt `attempt` failed with `kind`.
    ///
    /// `server_delay` is a server-requested minimum wait (parsed Retry-After
    /// from a rate-limit response). When present, the retry delay is the
    /// maximum of the policy delay and the server delay.
    ///
    /// Rate-limited failures are treated as transient regardless of strategy;
    /// permanent failures are never retried; the attempt budget bounds
    /// everything else.
    #[must_use]
    pub fn should_retry(
        &self,
        kind: FailureKind,
        attempt: u32,
        server_delay: Option<Duration>,
    ) -> RetryDecision {
        if kind == FailureKind::Permanent {
            return RetryDecision::GiveUp {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "attempt budget exhausted");
            return RetryDecision::GiveUp {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let mut delay = self.strategy.delay_for(attempt);
        if self.jitter {
            delay += jitter();
        }

        // Server-mandated minimum wait wins when it is longer.
        if let Some(server_delay) = server_delay {
            delay = delay.max(server_delay);
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            server_requested = server_delay.is_some(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

/// Generates random jitter between 0 and [`MAX_JITTER`].
///
/// Spreads out retries from workers that failed simultaneously.
fn jitter() -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Parses a Retry-After header value into a duration.
///
/// Accepts both forms from RFC 7231: integer seconds and HTTP-date. Values
/// are capped at one hour; negative or unparseable values yield `None`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use webtoon_dl::download::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    // Integer seconds first (most common)
    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);

        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }

        return Some(duration);
    }

    // HTTP-date form
    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();

        if let Ok(duration) = datetime.duration_since(now) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    max_secs = MAX_RETRY_AFTER.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            return Some(duration);
        }

        // Date in the past: no wait required
        return Some(Duration::ZERO);
    }

    debug!(header = header_value, "unparseable Retry-After value");
    None
}
