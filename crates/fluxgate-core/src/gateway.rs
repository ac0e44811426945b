//! Query gateway: the one business operation of the proxy.
//!
//! Each attempt opens a record stream, hands it to the caller's handler, and
//! drops it before anything else happens. Handler failures are classified
//! for retry exactly like query failures; the two are deliberately not
//! distinguished.

use std::sync::Arc;
use thiserror::Error;

use crate::client::{ClientError, QueryClient, RecordStream};
use crate::control::CancelToken;
use crate::retry::{RetryError, RetryExecutor};

/// Error raised by a caller-supplied result handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of one attempt: either the collaborator or the handler.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query failed")]
    Client(#[from] ClientError),

    #[error("result handler failed")]
    Handler(#[source] HandlerError),
}

/// Executes queries against the database collaborator through the retry
/// engine. Shared behind `Arc`; every call owns its own attempt state.
pub struct QueryGateway {
    client: Arc<dyn QueryClient>,
    executor: RetryExecutor,
}

impl QueryGateway {
    pub fn new(client: Arc<dyn QueryClient>, executor: RetryExecutor) -> Self {
        Self { client, executor }
    }

    /// Runs `sql`, applying `handler` to the open record stream exactly once
    /// per successful attempt. The stream is dropped on every exit path
    /// (success, handler failure, query failure) before any backoff wait
    /// starts, so no per-attempt resource leaks across retries.
    pub fn execute<R, H>(
        &self,
        sql: &str,
        cancel: &CancelToken,
        mut handler: H,
    ) -> Result<R, RetryError<QueryError>>
    where
        H: FnMut(&mut (dyn RecordStream + Send)) -> Result<R, HandlerError>,
    {
        self.executor.run(sql, cancel, || {
            let mut stream = self.client.run_query(sql)?;
            let value = handler(stream.as_mut()).map_err(QueryError::Handler)?;
            drop(stream);
            Ok(value)
        })
    }
}
