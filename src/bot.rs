//! Intake bot — the main message loop.
//!
//! Every incoming message produces exactly one reply: either the next prompt
//! or, once the last answer is in, the outcome of the submission. Messages
//! are handled one at a time in arrival order.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use futures::StreamExt;

use crate::channels::{Channel, IncomingMessage, MessageContent, OutgoingResponse};
use crate::error::Error;
use crate::intake::{
    Advance, Input, Language, Prompt, PromptKey, Sequencer, Session, SessionStore, Step, SubmittedRow,
    Submitter,
};
use crate::sink::SubmissionSink;

/// Commands recognized before a message is treated as an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start` or `/reset`: begin (or restart) the form.
    Start,
    /// Anything else: an answer to the pending question.
    Answer(Input),
}

impl Command {
    pub fn parse(content: &MessageContent) -> Command {
        match content {
            MessageContent::Text { text } => {
                // Deep links arrive as `/start <payload>`; group chats address
                // commands as `/start@BotName`.
                let first = text.split_whitespace().next().unwrap_or_default();
                let command = first.split('@').next().unwrap_or(first).to_lowercase();
                match command.as_str() {
                    "/start" | "/reset" => Command::Start,
                    _ => Command::Answer(Input::Text(text.clone())),
                }
            }
            MessageContent::Choice { data } => Command::Answer(Input::Choice(data.clone())),
            MessageContent::Other => Command::Answer(Input::Empty),
        }
    }
}

/// Key a message's session is stored under.
pub fn session_key(message: &IncomingMessage) -> String {
    format!("{}:{}", message.channel, message.user_id)
}

/// Owns the in-flight sessions and connects sequencer, sink and channel.
pub struct IntakeBot {
    sequencer: Sequencer,
    sessions: Arc<SessionStore>,
    sink: Arc<dyn SubmissionSink>,
}

impl IntakeBot {
    pub fn new(
        sequencer: Sequencer,
        sink: Arc<dyn SubmissionSink>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            sequencer,
            sessions,
            sink,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run until the channel's stream ends or Ctrl+C is received.
    pub async fn run(&self, channel: Arc<dyn Channel>) -> Result<(), Error> {
        channel.health_check().await?;
        let mut messages = channel.start().await?;

        tracing::info!(
            channel = channel.name(),
            variant = %self.sequencer.variant(),
            "Intake bot ready and listening"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = messages.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let response = self.handle_message(&message).await;
            if let Err(e) = channel.respond(&message, response).await {
                tracing::warn!(session = %session_key(&message), "Failed to send reply: {}", e);
            }
        }

        channel.shutdown().await?;
        Ok(())
    }

    /// Handle one message and return the reply to send.
    pub async fn handle_message(&self, message: &IncomingMessage) -> OutgoingResponse {
        let key = session_key(message);

        let input = match Command::parse(&message.content) {
            Command::Start => return self.start_session(key).await,
            Command::Answer(input) => input,
        };

        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(&key) else {
            tracing::debug!(session = %key, "Message outside a session");
            return self.fallback_text(PromptKey::NotStarted);
        };

        let answered = session.current_step;
        match self.sequencer.advance(session, input) {
            Advance::Repeat => into_response(self.sequencer.render_prompt(session)),
            Advance::Moved(_) => {
                let prompt = self.sequencer.render_prompt(session);
                if answered == Some(Step::Language) {
                    // The greeting waits until the user has picked a language.
                    self.with_greeting(session, prompt)
                } else {
                    into_response(prompt)
                }
            }
            Advance::Completed => {
                // Removed before the sink call: success and failure leave
                // the same state behind.
                let session = sessions.remove(&key);
                drop(sessions);
                match session {
                    Some(session) => self.submit(session, message).await,
                    None => self.fallback_text(PromptKey::NotStarted),
                }
            }
        }
    }

    async fn start_session(&self, key: String) -> OutgoingResponse {
        let mut sessions = self.sessions.lock().await;
        let session = match sessions.entry(key) {
            Entry::Occupied(entry) => {
                let session = entry.into_mut();
                self.sequencer.reset(session);
                tracing::info!(session = %session.session_id, "Session restarted");
                session
            }
            Entry::Vacant(entry) => {
                let session = self.sequencer.start(entry.key().clone());
                tracing::info!(session = %session.session_id, "Session started");
                entry.insert(session)
            }
        };

        let prompt = self.sequencer.render_prompt(session);
        if self.sequencer.variant().offers_language_choice() {
            into_response(prompt)
        } else {
            self.with_greeting(session, prompt)
        }
    }

    async fn submit(&self, session: Session, message: &IncomingMessage) -> OutgoingResponse {
        let language = session.language_or_fallback();
        let submitter = Submitter {
            user_id: message.user_id.clone(),
            username: message.username.clone(),
            submitted_at: message.received_at,
        };
        let row = SubmittedRow::build(self.sequencer.variant(), &session, &submitter);

        let key = match self.sink.append_row(row.cells()).await {
            Ok(()) => {
                tracing::info!(session = %session.session_id, "Intake submitted");
                PromptKey::Completed
            }
            Err(e) => {
                tracing::error!(session = %session.session_id, "Failed to save intake: {}", e);
                PromptKey::SubmitFailed
            }
        };

        OutgoingResponse::text(self.sequencer.text(language, key))
    }

    fn with_greeting(&self, session: &Session, prompt: Prompt) -> OutgoingResponse {
        let greeting = self
            .sequencer
            .text(session.language_or_fallback(), PromptKey::Greeting);
        OutgoingResponse::text(format!("{greeting}\n\n{}", prompt.text)).with_choices(prompt.choices)
    }

    fn fallback_text(&self, key: PromptKey) -> OutgoingResponse {
        OutgoingResponse::text(self.sequencer.text(Language::FALLBACK, key))
    }
}

fn into_response(prompt: Prompt) -> OutgoingResponse {
    OutgoingResponse::text(prompt.text).with_choices(prompt.choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{LocaleTable, Variant};
    use crate::sink::MemorySink;

    fn bot(variant: Variant, sink: Arc<MemorySink>) -> IntakeBot {
        let locale = Arc::new(LocaleTable::builtin().unwrap());
        IntakeBot::new(
            Sequencer::new(variant, locale),
            sink,
            Arc::new(SessionStore::new()),
        )
    }

    #[test]
    fn parse_commands() {
        let text = |t: &str| MessageContent::Text { text: t.into() };
        assert_eq!(Command::parse(&text("/start")), Command::Start);
        assert_eq!(Command::parse(&text(" /START ")), Command::Start);
        assert_eq!(Command::parse(&text("/start@IntakeBot")), Command::Start);
        assert_eq!(Command::parse(&text("/reset")), Command::Start);
        assert_eq!(Command::parse(&text("/start ref_42")), Command::Start);
        assert_eq!(Command::parse(&text("/start@IntakeBot ref")), Command::Start);
        assert_eq!(
            Command::parse(&text("/started a salon")),
            Command::Answer(Input::Text("/started a salon".into()))
        );
        assert_eq!(
            Command::parse(&MessageContent::Other),
            Command::Answer(Input::Empty)
        );
    }

    #[tokio::test]
    async fn start_greets_and_asks_first_question() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        let reply = bot
            .handle_message(&IncomingMessage::text("telegram", "1", "/start"))
            .await;

        assert!(reply.content.starts_with("👋"));
        assert!(reply.content.contains("Напишите название"));
        assert!(reply.choices.is_empty());
        assert_eq!(bot.sessions().len().await, 1);
    }

    #[tokio::test]
    async fn deep_link_start_opens_a_session() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        let reply = bot
            .handle_message(&IncomingMessage::text("telegram", "1", "/start ref_42"))
            .await;
        assert!(reply.content.starts_with("👋"));
        assert_eq!(bot.sessions().len().await, 1);

        bot.handle_message(&IncomingMessage::text("telegram", "1", "Acme"))
            .await;
        bot.handle_message(&IncomingMessage::text("telegram", "1", "/start ref_42"))
            .await;
        let session = bot.sessions().get("telegram:1").await.unwrap();
        assert!(session.answers.is_empty());
        assert_eq!(session.current_step, Some(Step::BrandName));
    }

    #[tokio::test]
    async fn answer_without_session_asks_to_start() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        let reply = bot
            .handle_message(&IncomingMessage::text("telegram", "1", "hello"))
            .await;
        assert!(reply.content.contains("/start"));
        assert!(bot.sessions().is_empty().await);
    }

    #[tokio::test]
    async fn restart_mid_flow_discards_answers() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        for text in ["/start", "Acme", "salon", "/start"] {
            bot.handle_message(&IncomingMessage::text("telegram", "1", text))
                .await;
        }
        let session = bot.sessions().get("telegram:1").await.unwrap();
        assert!(session.answers.is_empty());
        assert_eq!(session.current_step, Some(Step::BrandName));
    }

    #[tokio::test]
    async fn sessions_are_independent_per_user() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        bot.handle_message(&IncomingMessage::text("telegram", "1", "/start"))
            .await;
        bot.handle_message(&IncomingMessage::text("telegram", "2", "/start"))
            .await;
        bot.handle_message(&IncomingMessage::text("telegram", "1", "Acme"))
            .await;

        let one = bot.sessions().get("telegram:1").await.unwrap();
        let two = bot.sessions().get("telegram:2").await.unwrap();
        assert_eq!(one.answer("brand_name"), Some("Acme"));
        assert!(two.answers.is_empty());
    }

    #[tokio::test]
    async fn hosting_prompt_offers_buttons_and_repeats_on_text() {
        let bot = bot(Variant::Classic, Arc::new(MemorySink::new()));
        bot.handle_message(&IncomingMessage::text("telegram", "1", "/start"))
            .await;
        let mut reply = OutgoingResponse::text("");
        for _ in 0..12 {
            reply = bot
                .handle_message(&IncomingMessage::text("telegram", "1", "x"))
                .await;
        }
        assert_eq!(reply.choices.len(), 2);

        let again = bot
            .handle_message(&IncomingMessage::text("telegram", "1", "perhaps"))
            .await;
        assert_eq!(again, reply);
    }

    #[tokio::test]
    async fn language_pick_precedes_greeting() {
        let bot = bot(Variant::Multilingual, Arc::new(MemorySink::new()));
        let first = bot
            .handle_message(&IncomingMessage::text("telegram", "1", "/start"))
            .await;
        assert_eq!(first.choices.len(), 3);
        assert!(!first.content.starts_with("👋"));

        let second = bot
            .handle_message(&IncomingMessage::choice("telegram", "1", "lang_en"))
            .await;
        assert!(second.content.starts_with("👋 Hi!"));
        assert!(second.content.contains("brand or company"));
    }
}
