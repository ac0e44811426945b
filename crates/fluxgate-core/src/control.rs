//! Execution control: cancellation tokens and the in-flight query registry.
//!
//! Each gateway call owns one `CancelToken`; the retry loop waits through it
//! so a cancel request interrupts the backoff sleep instead of waiting it
//! out. `ActiveQueries` maps execution ids to their tokens so an operator
//! endpoint can inspect and cancel stuck executions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Clonable cancellation signal. `wait_timeout` parks the calling thread
/// until the timeout elapses or `cancel` fires, whichever comes first.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Wakes any thread parked in `wait_timeout`.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().unwrap()
    }

    /// Parks for up to `timeout`. Returns true if the token was cancelled
    /// before the full wait elapsed, false if the wait completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock().unwrap();
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .condvar
                .wait_timeout(cancelled, deadline - now)
                .unwrap();
            cancelled = guard;
        }
    }
}

/// Point-in-time view of one running execution.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub id: u64,
    pub sql: String,
    pub elapsed: Duration,
}

struct ActiveQuery {
    sql: String,
    started: Instant,
    token: CancelToken,
}

/// Registry of running query executions. The server registers an execution
/// before calling the gateway and unregisters it when the call returns;
/// the cancel endpoint fires the token of a registered execution.
#[derive(Default)]
pub struct ActiveQueries {
    next_id: AtomicU64,
    entries: RwLock<HashMap<u64, ActiveQuery>>,
}

impl ActiveQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a starting execution; returns its id and the token the
    /// gateway call should wait through.
    pub fn register(&self, sql: &str) -> (u64, CancelToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancelToken::new();
        self.entries.write().unwrap().insert(
            id,
            ActiveQuery {
                sql: sql.to_string(),
                started: Instant::now(),
                token: token.clone(),
            },
        );
        (id, token)
    }

    /// Removes a finished execution (success or failure).
    pub fn unregister(&self, id: u64) {
        self.entries.write().unwrap().remove(&id);
    }

    /// Fires the cancel token of a registered execution. Returns false if
    /// the id is unknown (already finished or never existed).
    pub fn cancel(&self, id: u64) -> bool {
        match self.entries.read().unwrap().get(&id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Snapshot of everything currently running, ordered by id.
    pub fn snapshot(&self) -> Vec<QuerySnapshot> {
        let mut all: Vec<QuerySnapshot> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(id, q)| QuerySnapshot {
                id: *id,
                sql: q.sql.clone(),
                elapsed: q.started.elapsed(),
            })
            .collect();
        all.sort_by_key(|s| s.id);
        all
    }
}
