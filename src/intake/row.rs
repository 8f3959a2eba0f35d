//! Submitted row — a completed session flattened into spreadsheet cells.

use chrono::{DateTime, Utc};

use super::session::Session;
use super::steps::Variant;

/// Who completed the form, appended after the answers.
#[derive(Debug, Clone)]
pub struct Submitter {
    /// Platform user id.
    pub user_id: String,
    /// Display handle, if the user has one.
    pub username: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Ordered cells: answers in the variant's field order, then user id,
/// username and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRow {
    cells: Vec<String>,
}

impl SubmittedRow {
    pub fn build(variant: Variant, session: &Session, submitter: &Submitter) -> Self {
        let mut cells: Vec<String> = variant
            .field_names()
            .map(|field| session.answer(field).unwrap_or_default().to_string())
            .collect();

        cells.push(submitter.user_id.clone());
        cells.push(submitter.username.clone().unwrap_or_default());
        cells.push(format_timestamp(submitter.submitted_at));

        Self { cells }
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

/// `2024-05-01 09:30:00+00:00`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}
