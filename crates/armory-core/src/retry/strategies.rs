//! Backoff calculation and retry predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::error::Error;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt` is 1-indexed (the attempt that just failed). With jitter
/// enabled, up to 25% random variation is added so that parallel tool
/// installs retrying against the same mirror do not stampede it in
/// lockstep.
///
/// # Example
///
/// ```rust
/// use armory_core::retry::calculate_delay;
/// use armory_core::types::RetryPolicy;
///
/// let policy = RetryPolicy::download();
/// let first = calculate_delay(&policy, 1, false);
/// let second = calculate_delay(&policy, 2, false);
/// assert!(second > first);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => policy.initial_delay_ms * (attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::rng().random_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether a failed attempt is worth repeating
///
/// The install path treats every failure as retryable (a flaky apt mirror
/// and a broken build look the same from outside the process); the
/// acquisition path narrows this to network-shaped failures via
/// [`MessagePredicate::network_errors`].
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Retry every failure until attempts run out
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Closure-backed predicate
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Retries only when the error message matches a known-transient pattern
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns,
        }
    }

    /// Patterns covering the transient failures git and curl actually emit
    pub fn network_errors() -> Self {
        Self::new(
            [
                "timeout",
                "timed out",
                "connection reset",
                "connection refused",
                "network unreachable",
                "temporary failure",
                "could not resolve host",
                "transfer closed",
                "early eof",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }
}

impl<E: Error> RetryPredicate<E> for MessagePredicate {
    fn should_retry(&self, error: &E) -> bool {
        let message = error.to_string().to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| message.contains(pattern.as_str()))
    }
}
