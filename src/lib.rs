//! Intake bot — conversational brief collection over chat, saved to a spreadsheet.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod intake;
pub mod routes;
pub mod sink;
