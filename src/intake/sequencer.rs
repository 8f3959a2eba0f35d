//! Step sequencer — drives a session through its variant's fixed step order.
//!
//! Nothing in here can fail: every input is accepted as free text except on
//! the two choice steps, where an unrecognized reply leaves the session where
//! it was so the prompt can be shown again.

use std::sync::Arc;

use tracing::debug;

use crate::channels::Choice;

use super::i18n::{Language, LocaleTable, PromptKey};
use super::session::Session;
use super::steps::{HostingChoice, Step, Variant};

/// A user's reply to the current prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Free text.
    Text(String),
    /// A button press, carrying the button's callback data.
    Choice(String),
    /// A message without text (photo, document, sticker, ...).
    Empty,
}

/// What `advance` did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The answer was stored; this step is now pending.
    Moved(Step),
    /// The answer to the last step was stored; the session is submittable.
    Completed,
    /// The input did not pick one of the offered choices; nothing changed.
    Repeat,
}

/// Text to send for the pending step, plus buttons when it offers choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub choices: Vec<Choice>,
}

/// Walks sessions through one variant's step table.
#[derive(Debug, Clone)]
pub struct Sequencer {
    variant: Variant,
    locale: Arc<LocaleTable>,
}

impl Sequencer {
    pub fn new(variant: Variant, locale: Arc<LocaleTable>) -> Self {
        Self { variant, locale }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Create a fresh session positioned at the first step.
    pub fn start(&self, session_id: impl Into<String>) -> Session {
        Session::new(session_id, self.variant.first_step())
    }

    /// Forget all answers and go back to the first step.
    pub fn reset(&self, session: &mut Session) {
        session.answers.clear();
        session.language = None;
        session.current_step = Some(self.variant.first_step());
    }

    /// Record `input` for the pending step and move to the next one.
    pub fn advance(&self, session: &mut Session, input: Input) -> Advance {
        if self.is_complete(session) {
            return Advance::Completed;
        }
        let Some(step) = session.current_step else {
            return Advance::Completed;
        };

        let value = match step {
            Step::Language => {
                let language = match &input {
                    Input::Text(code) | Input::Choice(code) => Language::resolve(code),
                    Input::Empty => Language::FALLBACK,
                };
                session.language = Some(language);
                language.code().to_string()
            }
            Step::HostingNeeded => match self.hosting_choice(session, &input) {
                Some(choice) => self
                    .text(session.language_or_fallback(), choice.label_key())
                    .to_string(),
                None => return Advance::Repeat,
            },
            _ => match input {
                Input::Text(text) => text.trim().to_string(),
                Input::Empty => self
                    .text(session.language_or_fallback(), PromptKey::NotProvided)
                    .to_string(),
                Input::Choice(_) => return Advance::Repeat,
            },
        };

        session.answers.insert(step.field_name().to_string(), value);
        session.current_step = self.variant.next_step(step);

        debug!(
            session = %session.session_id,
            step = %step,
            next = ?session.current_step,
            "Answer recorded"
        );

        match session.current_step {
            Some(next) => Advance::Moved(next),
            None => Advance::Completed,
        }
    }

    pub fn is_complete(&self, session: &Session) -> bool {
        session.current_step.is_none()
    }

    /// Display text for the pending step in the session's language.
    pub fn render_prompt(&self, session: &Session) -> Prompt {
        let language = session.language_or_fallback();
        let Some(step) = session.current_step else {
            return Prompt {
                text: self.text(language, PromptKey::Completed).to_string(),
                choices: Vec::new(),
            };
        };

        let choices = match step {
            Step::Language => Language::ALL
                .iter()
                .map(|l| Choice::new(l.native_name(), l.callback_data()))
                .collect(),
            Step::HostingNeeded => HostingChoice::ALL
                .iter()
                .map(|c| Choice::new(self.text(language, c.label_key()), c.callback_data()))
                .collect(),
            _ => Vec::new(),
        };

        Prompt {
            text: self.text(language, step.prompt_key()).to_string(),
            choices,
        }
    }

    pub fn text(&self, language: Language, key: PromptKey) -> &str {
        self.locale.lookup(language, key)
    }

    /// Map a hosting reply to one of the two outcomes. Buttons are the normal
    /// path; a typed label ("Да", "yes", "No") counts too.
    fn hosting_choice(&self, session: &Session, input: &Input) -> Option<HostingChoice> {
        match input {
            Input::Choice(data) => HostingChoice::from_callback(data),
            Input::Text(text) => {
                let typed = text.trim().to_lowercase();
                let language = session.language_or_fallback();
                HostingChoice::ALL.into_iter().find(|choice| {
                    let label = self.text(language, choice.label_key()).to_lowercase();
                    let plain = choice
                        .callback_data()
                        .strip_prefix("hosting_")
                        .unwrap_or_default();
                    typed == label || typed == plain
                })
            }
            Input::Empty => None,
        }
    }
}
