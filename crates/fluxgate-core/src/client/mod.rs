//! Database collaborator capability.
//!
//! The gateway only needs "run query, stream records, close", so this module
//! defines exactly that seam instead of mirroring a wide client interface.
//! `InfluxHttpClient` is the production implementation; tests substitute
//! their own.

mod error;
mod http;

pub use error::{ClientError, StatusKind};
pub use http::InfluxHttpClient;

/// One decoded result record (a row object from the query response).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Lazy sequence of result records. Dropping the stream releases the
/// per-attempt resource (the underlying connection/response), so early
/// close is always available.
pub trait RecordStream: Iterator<Item = Result<Record, ClientError>> {}

impl<T: Iterator<Item = Result<Record, ClientError>>> RecordStream for T {}

/// A client able to run one SQL query and stream back its records. Shared,
/// long-lived, and safe for concurrent use by simultaneous executions.
pub trait QueryClient: Send + Sync {
    fn run_query(&self, sql: &str) -> Result<Box<dyn RecordStream + Send>, ClientError>;
}
