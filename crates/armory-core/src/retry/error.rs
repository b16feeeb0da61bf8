//! Error types for the retry execution engine

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors that can occur while retrying an operation
///
/// Generic over `E`, the error type of the operation being retried, so the
/// acquisition and install paths can each keep their own error types.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total wall-clock time spent across all attempts
        total_duration: Duration,
    },

    /// Retrying was stopped early, either externally or by a predicate
    /// deciding mid-run that further attempts are pointless
    Cancelled {
        /// Number of attempts made before cancellation
        attempts: u32,
        /// The last error seen, if any attempt ran
        last_error: Option<E>,
    },

    /// A predicate classified the first failure as not worth retrying
    NonRetryable(E),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "retry exhausted after {} attempts over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::Cancelled {
                attempts,
                last_error: Some(err),
            } => write!(f, "retry cancelled after {attempts} attempts: {err}"),
            RetryError::Cancelled {
                attempts,
                last_error: None,
            } => write!(f, "retry cancelled after {attempts} attempts"),
            RetryError::NonRetryable(source) => write!(f, "non-retryable error: {source}"),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled {
                last_error: Some(err),
                ..
            } => Some(err),
            RetryError::Cancelled { .. } => None,
            RetryError::NonRetryable(source) => Some(source),
        }
    }
}

impl<E> RetryError<E> {
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    pub fn cancelled(attempts: u32, last_error: Option<E>) -> Self {
        RetryError::Cancelled {
            attempts,
            last_error,
        }
    }

    pub fn non_retryable(source: E) -> Self {
        RetryError::NonRetryable(source)
    }

    /// Number of attempts that actually ran
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Cancelled { attempts, .. } => *attempts,
            RetryError::NonRetryable(_) => 1,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable(_))
    }

    /// The underlying operation error, consuming the wrapper
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
            RetryError::NonRetryable(source) => Some(source),
        }
    }
}
