//! Retry loop: run an operation until success, a permanent error, the
//! attempt ceiling, or cancellation.

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use crate::control::CancelToken;
use crate::ledger::{AttemptRecord, AttemptSink, AttemptStatus};

use super::classify::classify;
use super::error::RetryError;
use super::policy::{Backoff, RetryDecision};

/// Drives classified retries around a fallible operation.
///
/// Classification gates termination: a permanent error stops the loop no
/// matter how much attempt budget remains. `max_attempts` is a safety
/// ceiling on top of that, counting every invocation including the first.
pub struct RetryExecutor {
    backoff: Backoff,
    max_attempts: u32,
    sink: Arc<dyn AttemptSink>,
}

impl RetryExecutor {
    pub fn new(backoff: Backoff, max_attempts: u32, sink: Arc<dyn AttemptSink>) -> Self {
        Self {
            backoff,
            max_attempts: max_attempts.max(1),
            sink,
        }
    }

    /// Invokes `op` until it succeeds or fails terminally. Each attempt is
    /// timed and reported to the sink and the log, success or failure.
    ///
    /// The backoff wait goes through `cancel`, so a cancellation request
    /// interrupts the sleep and surfaces `RetryError::Cancelled` instead of
    /// starting another attempt.
    pub fn run<T, E, F>(
        &self,
        description: &str,
        cancel: &CancelToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Error + 'static,
        F: FnMut() -> Result<T, E>,
    {
        // Zero-based count of prior failed attempts; resets with each call.
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            let started = Instant::now();
            let outcome = op();
            let elapsed = started.elapsed();
            match outcome {
                Ok(value) => {
                    self.observe(description, elapsed, AttemptStatus::Success);
                    return Ok(value);
                }
                Err(err) => {
                    self.observe(description, elapsed, AttemptStatus::Failure);
                    if classify(&err) == RetryDecision::NoRetry {
                        return Err(RetryError::Permanent(err));
                    }
                    let attempts_made = attempt + 1;
                    if attempts_made >= self.max_attempts {
                        tracing::warn!(
                            "giving up on {} after {} attempts: {}",
                            description,
                            attempts_made,
                            err
                        );
                        return Err(RetryError::BudgetExhausted {
                            attempts: attempts_made,
                            source: err,
                        });
                    }
                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(
                        attempt = attempts_made,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off: {}",
                        err
                    );
                    if cancel.wait_timeout(delay) {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn observe(&self, description: &str, elapsed: std::time::Duration, status: AttemptStatus) {
        tracing::info!(
            "query executed: {} in {} ms with status {}",
            description,
            elapsed.as_millis(),
            status
        );
        self.sink.record(&AttemptRecord {
            operation: description.to_string(),
            elapsed,
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingSink {
        records: Mutex<Vec<AttemptRecord>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(Vec::new()),
            })
        }

        fn statuses(&self) -> Vec<AttemptStatus> {
            self.records.lock().unwrap().iter().map(|r| r.status).collect()
        }
    }

    impl AttemptSink for RecordingSink {
        fn record(&self, record: &AttemptRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1), 2.0, Duration::from_millis(4)).unwrap()
    }

    fn timeout_err() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "read timed out")
    }

    #[test]
    fn success_takes_exactly_one_attempt() {
        let sink = RecordingSink::new();
        let executor = RetryExecutor::new(fast_backoff(), 10, sink.clone());
        let mut calls = 0u32;
        let result: Result<u32, RetryError<io::Error>> =
            executor.run("SELECT 1", &CancelToken::new(), || {
                calls += 1;
                Ok(42)
            });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
        assert_eq!(sink.statuses(), vec![AttemptStatus::Success]);
    }

    #[test]
    fn transient_failures_retry_until_success() {
        let sink = RecordingSink::new();
        let executor = RetryExecutor::new(fast_backoff(), 10, sink.clone());
        let mut calls = 0u32;
        let result: Result<&str, RetryError<io::Error>> =
            executor.run("SELECT 1", &CancelToken::new(), || {
                calls += 1;
                if calls < 3 {
                    Err(timeout_err())
                } else {
                    Ok("row")
                }
            });
        assert_eq!(result.unwrap(), "row");
        assert_eq!(calls, 3);
        assert_eq!(
            sink.statuses(),
            vec![
                AttemptStatus::Failure,
                AttemptStatus::Failure,
                AttemptStatus::Success
            ]
        );
    }

    #[test]
    fn permanent_error_stops_after_one_attempt() {
        let sink = RecordingSink::new();
        let executor = RetryExecutor::new(fast_backoff(), 10, sink.clone());
        let mut calls = 0u32;
        let result: Result<(), RetryError<io::Error>> =
            executor.run("SELECT 1", &CancelToken::new(), || {
                calls += 1;
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            });
        assert!(matches!(result, Err(RetryError::Permanent(_))));
        assert_eq!(calls, 1);
        assert_eq!(sink.statuses(), vec![AttemptStatus::Failure]);
    }

    #[test]
    fn ceiling_caps_attempts_and_reports_exhaustion() {
        let sink = RecordingSink::new();
        let executor = RetryExecutor::new(fast_backoff(), 3, sink.clone());
        let mut calls = 0u32;
        let result: Result<(), RetryError<io::Error>> =
            executor.run("SELECT 1", &CancelToken::new(), || {
                calls += 1;
                Err(timeout_err())
            });
        match result {
            Err(RetryError::BudgetExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
            }
            other => panic!("expected budget exhaustion, got {other:?}"),
        }
        assert_eq!(calls, 3);
        assert_eq!(sink.statuses().len(), 3);
    }

    #[test]
    fn cancellation_during_backoff_aborts_the_loop() {
        let sink = RecordingSink::new();
        let backoff =
            Backoff::new(Duration::from_secs(10), 2.0, Duration::from_secs(10)).unwrap();
        let executor = RetryExecutor::new(backoff, 10, sink);
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let started = Instant::now();
        let result: Result<(), RetryError<io::Error>> =
            executor.run("SELECT 1", &token, || Err(timeout_err()));
        handle.join().unwrap();
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "cancel must interrupt the wait, not sleep it out"
        );
    }

    #[test]
    fn already_cancelled_token_prevents_any_attempt() {
        let sink = RecordingSink::new();
        let executor = RetryExecutor::new(fast_backoff(), 10, sink.clone());
        let token = CancelToken::new();
        token.cancel();
        let mut calls = 0u32;
        let result: Result<(), RetryError<io::Error>> = executor.run("SELECT 1", &token, || {
            calls += 1;
            Ok(())
        });
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls, 0);
        assert!(sink.statuses().is_empty());
    }
}
