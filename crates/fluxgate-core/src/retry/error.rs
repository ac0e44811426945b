//! Terminal error shapes produced by the retry loop.

use thiserror::Error;

/// How a retried execution ultimately failed.
///
/// `Permanent` carries the original error untouched; the classifier's
/// decision never replaces what the operation actually raised.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The error chain did not classify as transient.
    #[error(transparent)]
    Permanent(E),

    /// Every attempt failed with a transient cause and the safety ceiling
    /// was reached. Carries the last underlying error.
    #[error("retry budget exhausted after {attempts} attempts")]
    BudgetExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The caller's cancellation signal fired during a backoff wait.
    #[error("execution cancelled during backoff wait")]
    Cancelled,
}
