//! Retry decisions for failed fetch/extract attempts.
//!
//! The policy is a pure function of the attempt number and the failure
//! class; the only randomness is the jitter added to each delay.

use crate::extract::ExtractionError;
use crate::fetch::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Flattened failure classification shared by the policy and the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    RateLimited,
    Unreachable,
    ServerError,
    Blocked,
    NotFound,
    MissingField,
    MalformedValue,
}

impl FailureClass {
    /// Every class, transient ones first.
    pub const ALL: [FailureClass; 7] = [
        FailureClass::RateLimited,
        FailureClass::Unreachable,
        FailureClass::ServerError,
        FailureClass::Blocked,
        FailureClass::NotFound,
        FailureClass::MissingField,
        FailureClass::MalformedValue,
    ];

    /// Whether a later attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureClass::RateLimited
                | FailureClass::Unreachable
                | FailureClass::ServerError
                | FailureClass::Blocked
        )
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureClass::RateLimited => "rate_limited",
            FailureClass::Unreachable => "unreachable",
            FailureClass::ServerError => "server_error",
            FailureClass::Blocked => "blocked",
            FailureClass::NotFound => "not_found",
            FailureClass::MissingField => "missing_field",
            FailureClass::MalformedValue => "malformed_value",
        };
        f.write_str(s)
    }
}

impl From<&FetchError> for FailureClass {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::RateLimited { .. } => FailureClass::RateLimited,
            FetchError::Unreachable { .. } => FailureClass::Unreachable,
            FetchError::ServerError { .. } => FailureClass::ServerError,
            FetchError::NotFound { .. } => FailureClass::NotFound,
        }
    }
}

impl From<&ExtractionError> for FailureClass {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::MissingField(_) => FailureClass::MissingField,
            ExtractionError::MalformedValue { .. } => FailureClass::MalformedValue,
            ExtractionError::Blocked => FailureClass::Blocked,
        }
    }
}

/// Why the policy stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveUpReason {
    /// The failure is permanent; retrying cannot help.
    NonRetryable,
    /// The attempt budget for a transient failure is spent.
    Exhausted,
}

/// Decision from [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep this long, then try again.
    Wait(Duration),
    GiveUp(GiveUpReason),
}

/// Retry configuration.
///
/// Delay before retry `n` (after failed attempt `n`) is
/// `base_delay * 2^(n-1)`, shifted by a uniform offset in
/// `[-jitter, +jitter]` and clamped to `[0, max_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per product per cycle, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap on every computed delay, jitter included.
    pub max_delay: Duration,
    pub jitter: Duration,
    /// Optional tighter budget for generic 5xx responses.
    pub server_error_max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1000),
            server_error_max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// A policy with zero delays.
    #[cfg(test)]
    pub(crate) fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            server_error_max_attempts: None,
        }
    }

    /// Decides what to do after `attempt` (1-based) failed with `class`.
    pub fn should_retry(&self, attempt: u32, class: FailureClass) -> RetryDecision {
        if !class.is_transient() {
            return RetryDecision::GiveUp(GiveUpReason::NonRetryable);
        }

        if attempt >= self.attempt_limit(class) {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }

        RetryDecision::Wait(self.delay_for(attempt))
    }

    /// Maximum attempts allowed for a failure class.
    pub fn attempt_limit(&self, class: FailureClass) -> u32 {
        let max = self.max_attempts.max(1);
        match (class, self.server_error_max_attempts) {
            (FailureClass::ServerError, Some(limit)) => limit.clamp(1, max),
            _ => max,
        }
    }

    /// Exponential backoff without jitter, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff with jitter applied, never above `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = millis(self.backoff(attempt));
        let jitter = millis(self.jitter);
        if jitter == 0 {
            return Duration::from_millis(base);
        }

        let offset = rand::random_range(0..=jitter.saturating_mul(2));
        let ms = base.saturating_add(offset).saturating_sub(jitter);
        Duration::from_millis(ms).min(self.max_delay)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
