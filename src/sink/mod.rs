//! Submission sinks — where completed rows are appended.

pub mod memory;
pub mod sheets;

use async_trait::async_trait;

use crate::error::SinkError;

pub use memory::MemorySink;
pub use sheets::{GoogleSheetsSink, ServiceAccountKey, SheetsConfig};

/// Append-only store of submitted rows.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Append one row. Called once per completed session; never retried.
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError>;
}
