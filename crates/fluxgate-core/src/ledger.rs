//! Attempt-level observability: a write-only sink fed by the retry loop and
//! a bounded in-memory ledger implementation behind it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    Failure,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Success => write!(f, "success"),
            AttemptStatus::Failure => write!(f, "failure"),
        }
    }
}

/// One attempt's record: what ran, how long it took, how it ended.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub operation: String,
    pub elapsed: Duration,
    pub status: AttemptStatus,
}

/// Write-only observer of attempt records. Implementations must tolerate
/// concurrent calls from multiple executions.
pub trait AttemptSink: Send + Sync {
    fn record(&self, record: &AttemptRecord);
}

/// Sink that drops everything; for callers that only want the tracing output.
pub struct NullSink;

impl AttemptSink for NullSink {
    fn record(&self, _record: &AttemptRecord) {}
}

/// Bounded ring of `"<timestamp>: <status>"` lines, oldest evicted first.
pub struct ResultsLedger {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl ResultsLedger {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Entries oldest-first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultsLedger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl AttemptSink for ResultsLedger {
    fn record(&self, record: &AttemptRecord) {
        let line = format!("{}: {}", chrono::Utc::now().to_rfc3339(), record.status);
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(line);
    }
}
