//! Intake form — a fixed, linear questionnaire driven one message at a time.
//!
//! Each user gets a `Session` that walks the step table of the configured
//! `Variant`. The `Sequencer` records one answer per incoming message and
//! moves to the next step; once the last step is answered the session is
//! flattened into a `SubmittedRow` and handed to a sink.

pub mod i18n;
pub mod row;
pub mod sequencer;
pub mod session;
pub mod steps;

pub use i18n::{Language, LocaleTable, PromptKey};
pub use row::{SubmittedRow, Submitter};
pub use sequencer::{Advance, Input, Prompt, Sequencer};
pub use session::{Session, SessionStore};
pub use steps::{HostingChoice, Step, Variant};
