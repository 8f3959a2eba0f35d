//! Telegram channel — long-polls the Bot API for updates.
//!
//! Text messages, non-text messages and inline-keyboard button presses are
//! all turned into `IncomingMessage`s. Replies carry their choices as an
//! inline keyboard.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::channels::{
    Channel, Choice, IncomingMessage, MessageContent, MessageStream, OutgoingResponse,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause before polling again after a failed or rejected getUpdates call.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Send a text message, splitting it when it exceeds Telegram's limit.
    /// The keyboard, if any, is attached to the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        choices: &[Choice],
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last && !choices.is_empty() {
                body["reply_markup"] = inline_keyboard(choices);
            }

            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
                .map_err(|e| ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: e.to_string(),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let err = resp.text().await.unwrap_or_default();
                return Err(ChannelError::SendFailed {
                    name: "telegram".into(),
                    reason: format!("sendMessage failed ({status}): {err}"),
                });
            }
        }
        Ok(())
    }

    /// Stop the client's loading spinner on a pressed button.
    async fn answer_callback_query(&self, callback_query_id: &str) {
        let result = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&serde_json::json!({ "callback_query_id": callback_query_id }))
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!("Telegram answerCallbackQuery failed: {e}");
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let Some(results) = update_batch(&data) else {
                    tracing::warn!("Telegram getUpdates returned no result: {data}");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    let is_allowed = {
                        let mut identities = vec![incoming.user_id.as_str()];
                        if let Some(ref name) = incoming.username {
                            identities.push(name.as_str());
                        }
                        check_user_allowed(&allowed_users, identities)
                    };

                    if !is_allowed {
                        tracing::warn!(
                            "Telegram: ignoring message from unauthorized user: \
                             username={}, user_id={}",
                            incoming.username.as_deref().unwrap_or("unknown"),
                            incoming.user_id
                        );
                        continue;
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        if let Some(callback_id) = msg.metadata.get("callback_query_id").and_then(|v| v.as_str())
        {
            self.answer_callback_query(callback_id).await;
        }

        self.send_message(chat_id, &response.content, &response.choices)
            .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Updates carried by a getUpdates reply. `None` when Telegram rejected the
/// poll, e.g. `{"ok": false, "error_code": 409}` while a webhook is set.
fn update_batch(data: &Value) -> Option<&Vec<Value>> {
    if data.get("ok").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    data.get("result").and_then(Value::as_array)
}

/// Turn one getUpdates entry into an `IncomingMessage`.
///
/// Returns `None` for update kinds the bot does not handle or that lack a
/// sender or chat.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(message) = update.get("message") {
        let content = match message.get("text").and_then(Value::as_str) {
            Some(text) => MessageContent::Text {
                text: text.to_string(),
            },
            None => MessageContent::Other,
        };
        let chat_id = message.get("chat")?.get("id")?.as_i64()?;
        let received_at = message
            .get("date")
            .and_then(Value::as_i64)
            .and_then(unix_to_utc)
            .unwrap_or_else(Utc::now);

        return Some(
            build_incoming(message.get("from")?, content)?
                .with_received_at(received_at)
                .with_metadata(serde_json::json!({ "chat_id": chat_id.to_string() })),
        );
    }

    if let Some(callback) = update.get("callback_query") {
        let data = callback.get("data")?.as_str()?;
        let callback_id = callback.get("id")?.as_str()?;
        let chat_id = callback.get("message")?.get("chat")?.get("id")?.as_i64()?;

        return Some(
            build_incoming(
                callback.get("from")?,
                MessageContent::Choice {
                    data: data.to_string(),
                },
            )?
            .with_metadata(serde_json::json!({
                "chat_id": chat_id.to_string(),
                "callback_query_id": callback_id,
            })),
        );
    }

    None
}

fn build_incoming(from: &Value, content: MessageContent) -> Option<IncomingMessage> {
    let user_id = from.get("id")?.as_i64()?.to_string();
    let mut incoming = IncomingMessage::new("telegram", &user_id, content);
    if let Some(username) = from.get("username").and_then(Value::as_str) {
        incoming = incoming.with_username(username);
    }
    Some(incoming)
}

fn unix_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Build an inline keyboard with all choices on one row.
fn inline_keyboard(choices: &[Choice]) -> Value {
    let row: Vec<Value> = choices
        .iter()
        .map(|c| serde_json::json!({ "text": c.label, "callback_data": c.data }))
        .collect();
    serde_json::json!({ "inline_keyboard": [row] })
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts at a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telegram_channel_name() {
        let ch = TelegramChannel::new("fake-token".into(), vec!["*".into()]);
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramChannel::new("123:ABC".into(), vec![]);
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allowed(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(check_user_allowed(&allowed(&["*"]), ["anyone"]));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        let list = allowed(&["alice", "bob"]);
        assert!(check_user_allowed(&list, ["alice"]));
        assert!(!check_user_allowed(&list, ["eve"]));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        let list = allowed(&["alice"]);
        assert!(!check_user_allowed(&list, ["alice_bot"]));
        assert!(!check_user_allowed(&list, ["malice"]));
    }

    #[test]
    fn telegram_user_allowed_by_numeric_id_identity() {
        let list = allowed(&["123456789"]);
        assert!(check_user_allowed(&list, ["unknown", "123456789"]));
        assert!(!check_user_allowed(&list, ["unknown", "987"]));
    }

    #[test]
    fn telegram_empty_allow_list_rejects_everyone() {
        assert!(!check_user_allowed(&[], ["42", "acme_owner"]));
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn update_batch_accepts_ok_reply() {
        let data = serde_json::json!({
            "ok": true,
            "result": [{ "update_id": 1 }, { "update_id": 2 }]
        });
        assert_eq!(update_batch(&data).map(Vec::len), Some(2));

        let empty = serde_json::json!({ "ok": true, "result": [] });
        assert_eq!(update_batch(&empty).map(Vec::len), Some(0));
    }

    #[test]
    fn update_batch_rejects_conflict_reply() {
        let conflict = serde_json::json!({
            "ok": false,
            "error_code": 409,
            "description": "Conflict: can't use getUpdates method while webhook is active"
        });
        assert!(update_batch(&conflict).is_none());
        assert!(update_batch(&serde_json::json!({})).is_none());
    }

    #[test]
    fn parse_text_message() {
        let update = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1714555800,
                "chat": { "id": 555, "type": "private" },
                "from": { "id": 42, "username": "acme_owner", "first_name": "Ann" },
                "text": "Acme Salon"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.username.as_deref(), Some("acme_owner"));
        assert_eq!(
            msg.content,
            MessageContent::Text {
                text: "Acme Salon".into()
            }
        );
        assert_eq!(msg.metadata["chat_id"], "555");
        assert_eq!(msg.received_at.timestamp(), 1714555800);
    }

    #[test]
    fn parse_photo_message_without_text() {
        let update = serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "date": 1714555800,
                "chat": { "id": 555 },
                "from": { "id": 42 },
                "photo": [{ "file_id": "abc", "width": 90, "height": 90 }]
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(msg.content, MessageContent::Other);
        assert_eq!(msg.username, None);
    }

    #[test]
    fn parse_callback_query() {
        let update = serde_json::json!({
            "update_id": 12,
            "callback_query": {
                "id": "cbq-1",
                "from": { "id": 42, "username": "acme_owner" },
                "message": { "message_id": 3, "chat": { "id": 555 } },
                "data": "hosting_yes"
            }
        });

        let msg = parse_update(&update).unwrap();
        assert_eq!(
            msg.content,
            MessageContent::Choice {
                data: "hosting_yes".into()
            }
        );
        assert_eq!(msg.metadata["chat_id"], "555");
        assert_eq!(msg.metadata["callback_query_id"], "cbq-1");
    }

    #[test]
    fn parse_ignores_other_update_kinds() {
        let update = serde_json::json!({
            "update_id": 13,
            "edited_message": { "text": "changed" }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn parse_message_without_sender_is_dropped() {
        let update = serde_json::json!({
            "update_id": 14,
            "message": { "chat": { "id": 1 }, "text": "channel post" }
        });
        assert!(parse_update(&update).is_none());
    }

    // ── Keyboard ────────────────────────────────────────────────────

    #[test]
    fn inline_keyboard_single_row() {
        let markup = inline_keyboard(&[
            Choice::new("Да", "hosting_yes"),
            Choice::new("Нет", "hosting_no"),
        ]);
        assert_eq!(
            markup,
            serde_json::json!({
                "inline_keyboard": [[
                    { "text": "Да", "callback_data": "hosting_yes" },
                    { "text": "Нет", "callback_data": "hosting_no" }
                ]]
            })
        );
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // Cyrillic letters are two bytes each.
        let msg = "я".repeat(3000);
        let chunks = split_message(&msg, 4097);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == 'я')));
        assert_eq!(chunks.concat(), msg);
    }

    #[tokio::test]
    async fn respond_without_chat_id_fails() {
        let ch = TelegramChannel::new("fake-token".into(), vec!["*".into()]);
        let msg = IncomingMessage::text("telegram", "42", "hi");
        let err = ch
            .respond(&msg, OutgoingResponse::text("hello"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat_id"));
    }
}
