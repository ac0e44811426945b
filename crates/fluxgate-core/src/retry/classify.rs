//! Classify a failed attempt's error chain into retry / no-retry.

use std::error::Error;
use std::io;

use crate::client::{ClientError, StatusKind};

use super::policy::RetryDecision;

/// Walks the error's `source()` chain from outermost to innermost cause and
/// returns `Retry` on the first transient-looking cause. Wrapping layers
/// (gateway, HTTP stack, handler) may bury the real cause several levels
/// deep, so every link is inspected, not just the top-level error.
///
/// An exhausted chain means no retry: anything unrecognized is permanent.
pub fn classify(err: &(dyn Error + 'static)) -> RetryDecision {
    let mut cause: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(c) = cause {
        if is_transient_cause(c) {
            return RetryDecision::Retry;
        }
        cause = c.source();
    }
    RetryDecision::NoRetry
}

fn is_transient_cause(cause: &(dyn Error + 'static)) -> bool {
    if let Some(client) = cause.downcast_ref::<ClientError>() {
        if let ClientError::Status {
            status: StatusKind::Unavailable | StatusKind::TimedOut,
            ..
        } = client
        {
            return true;
        }
    }
    if let Some(io_err) = cause.downcast_ref::<io::Error>() {
        if is_transient_io(io_err.kind()) {
            return true;
        }
    }
    if let Some(ClientError::Api { message }) = cause.downcast_ref::<ClientError>() {
        // Heuristic: the server reports a dropped Arrow stream only through
        // this message text. Fragile against upstream wording changes.
        if message.contains("EOF reached while reading") {
            return true;
        }
    }
    // Heuristic: gateway timeouts often surface only as "504" somewhere in a
    // wrapped message rather than as a typed status.
    cause.to_string().contains("504")
}

/// Socket timeouts and connection-level failures are worth re-attempting;
/// everything else (permissions, invalid input, ...) is not.
fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    /// Opaque wrapper used to build multi-level cause chains in tests.
    #[derive(Debug)]
    struct Wrap {
        msg: String,
        source: Option<Box<dyn Error + Send + Sync>>,
    }

    impl Wrap {
        fn new(msg: &str, source: Option<Box<dyn Error + Send + Sync>>) -> Self {
            Self {
                msg: msg.to_string(),
                source,
            }
        }
    }

    impl fmt::Display for Wrap {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.msg)
        }
    }

    impl Error for Wrap {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_deref().map(|e| e as &(dyn Error + 'static))
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            status: StatusKind::Unavailable,
            message: "server overloaded".into(),
        }
    }

    #[test]
    fn unavailable_status_is_retryable() {
        assert_eq!(classify(&unavailable()), RetryDecision::Retry);
    }

    #[test]
    fn timed_out_status_is_retryable() {
        let err = ClientError::Status {
            status: StatusKind::TimedOut,
            message: "deadline elapsed".into(),
        };
        assert_eq!(classify(&err), RetryDecision::Retry);
    }

    #[test]
    fn transient_status_buried_two_levels_deep_is_found() {
        let chain = Wrap::new(
            "request handling failed",
            Some(Box::new(Wrap::new(
                "query dispatch failed",
                Some(Box::new(unavailable())),
            ))),
        );
        assert_eq!(classify(&chain), RetryDecision::Retry);
    }

    #[test]
    fn socket_timeout_is_retryable() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "read timed out");
        assert_eq!(classify(&err), RetryDecision::Retry);
    }

    #[test]
    fn connection_reset_nested_in_wrapper_is_retryable() {
        let chain = Wrap::new(
            "stream aborted",
            Some(Box::new(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "peer reset",
            ))),
        );
        assert_eq!(classify(&chain), RetryDecision::Retry);
    }

    #[test]
    fn eof_mid_read_message_is_retryable() {
        let err = ClientError::Api {
            message: "EOF reached while reading the record batch".into(),
        };
        assert_eq!(classify(&err), RetryDecision::Retry);
    }

    #[test]
    fn gateway_timeout_substring_anywhere_is_retryable() {
        let chain = Wrap::new(
            "upstream said: HTTP 504 Gateway Timeout",
            None,
        );
        assert_eq!(classify(&chain), RetryDecision::Retry);
    }

    #[test]
    fn auth_failure_is_permanent() {
        let err = ClientError::Api {
            message: "unauthorized: invalid token".into(),
        };
        assert_eq!(classify(&err), RetryDecision::NoRetry);
    }

    #[test]
    fn decode_failure_is_permanent() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(classify(&ClientError::Decode(bad)), RetryDecision::NoRetry);
    }

    #[test]
    fn unrecognized_chain_is_permanent() {
        let chain = Wrap::new(
            "schema error",
            Some(Box::new(Wrap::new("column does not exist", None))),
        );
        assert_eq!(classify(&chain), RetryDecision::NoRetry);
    }

    #[test]
    fn permission_denied_io_is_permanent() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify(&err), RetryDecision::NoRetry);
    }
}
