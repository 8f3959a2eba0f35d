//! In-memory sink for tests and local runs.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::SubmissionSink;
use crate::error::SinkError;

/// Keeps appended rows in a vector. Can be told to fail every append.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<Vec<String>>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose appends always fail.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SubmissionSink for MemorySink {
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink set to fail".into()));
        }
        self.rows
            .lock()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?
            .push(row.to_vec());
        Ok(())
    }
}
