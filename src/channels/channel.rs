//! Channel trait and the message types passed across it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// What the user actually sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// A text message.
    Text { text: String },
    /// A press on one of the buttons offered with the previous prompt.
    Choice { data: String },
    /// Anything without text: photos, documents, stickers.
    Other,
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel name, e.g. `"telegram"`.
    pub channel: String,
    /// Platform user id.
    pub user_id: String,
    /// Platform handle, if the user has one.
    pub username: Option<String>,
    pub content: MessageContent,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (chat id, callback id).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: MessageContent) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            username: None,
            content,
            received_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    /// Shorthand for a plain text message.
    pub fn text(channel: &str, user_id: &str, text: &str) -> Self {
        Self::new(
            channel,
            user_id,
            MessageContent::Text {
                text: text.to_string(),
            },
        )
    }

    /// Shorthand for a button press.
    pub fn choice(channel: &str, user_id: &str, data: &str) -> Self {
        Self::new(
            channel,
            user_id,
            MessageContent::Choice {
                data: data.to_string(),
            },
        )
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A selectable button attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// A reply sent back through the channel the message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub content: String,
    pub choices: Vec<Choice>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }
}

/// Stream of incoming messages produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Reply to `msg`.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
