//! Per-user conversation state and the in-memory store holding it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::i18n::Language;
use super::steps::Step;

/// One user's in-progress intake conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Platform-assigned identity of the remote user.
    pub session_id: String,
    /// Pending question; `None` once the last step has been answered.
    pub current_step: Option<Step>,
    /// Selected display language, if the variant asked for one.
    pub language: Option<Language>,
    /// Answers collected so far, keyed by field name.
    pub answers: HashMap<String, String>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, first_step: Step) -> Self {
        Self {
            session_id: session_id.into(),
            current_step: Some(first_step),
            language: None,
            answers: HashMap::new(),
        }
    }

    pub fn language_or_fallback(&self) -> Language {
        self.language.unwrap_or(Language::FALLBACK)
    }

    pub fn answer(&self, field: &str) -> Option<&str> {
        self.answers.get(field).map(String::as_str)
    }
}

/// In-flight sessions keyed by session id. Nothing here survives a restart
/// and idle sessions are never expired.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map for a read-modify-write on one session.
    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().await
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
