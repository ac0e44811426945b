//! Error surface of the database collaborator.

use std::fmt;
use thiserror::Error;

/// Transport-level status reported by the database's query RPC layer.
///
/// Deliberately a small closed set: only the statuses the retry classifier
/// cares about get their own shape, everything else stays a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The server (or an intermediary) reported itself unavailable.
    Unavailable,
    /// The query deadline elapsed before a response arrived.
    TimedOut,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Unavailable => write!(f, "unavailable"),
            StatusKind::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Error raised by a `QueryClient` while opening or reading a query stream.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport status from the query RPC layer (e.g. HTTP 503, deadline hit).
    #[error("query rpc status {status}: {message}")]
    Status { status: StatusKind, message: String },

    /// The HTTP stack failed below the status-code level (connect, TLS, ...).
    #[error("transport failure talking to the database")]
    Transport(#[source] reqwest::Error),

    /// The database API rejected or aborted the query; `message` is the
    /// server-reported text.
    #[error("database api error: {message}")]
    Api { message: String },

    /// A record in the response body failed to decode.
    #[error("malformed record in query response")]
    Decode(#[source] serde_json::Error),

    /// I/O failure while streaming the response body.
    #[error("i/o error while streaming query response")]
    Io(#[source] std::io::Error),
}
