//! Localization table — display text keyed by (language, prompt key).
//!
//! The table is loaded once at startup from a JSON document shaped as
//! `{ "<prompt_key>": { "<language>": "<text>" } }` and checked for key-set
//! parity: every prompt key must carry non-empty text in every supported
//! language. Lookups after that never fail.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LocaleError;

/// Built-in table shipped with the binary.
const BUILTIN_LOCALES: &str = include_str!("../../locales/intake.json");

/// Supported display languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    Es,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ru, Language::En, Language::Es];

    /// Language used when a session has none selected or asked for an
    /// unsupported one.
    pub const FALLBACK: Language = Language::Ru;

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
            Self::Es => "es",
        }
    }

    /// Name of the language written in that language (button labels).
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::Ru => "🇷🇺 Русский",
            Self::En => "🇬🇧 English",
            Self::Es => "🇪🇸 Español",
        }
    }

    /// Callback payload of the language selection button.
    pub fn callback_data(&self) -> String {
        format!("lang_{}", self.code())
    }

    /// Parse a language code (`"ru"`, `"EN"`, `"lang_es"`) or a plain native
    /// name (`"español"`).
    pub fn from_code(code: &str) -> Option<Language> {
        let normalized = code.trim().to_lowercase();
        let normalized = normalized.strip_prefix("lang_").unwrap_or(&normalized);
        match normalized {
            "ru" | "русский" => Some(Self::Ru),
            "en" | "english" => Some(Self::En),
            "es" | "español" | "espanol" => Some(Self::Es),
            _ => None,
        }
    }

    /// Like [`Language::from_code`] but never fails: unsupported codes map to
    /// [`Language::FALLBACK`].
    pub fn resolve(code: &str) -> Language {
        Self::from_code(code).unwrap_or(Self::FALLBACK)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every piece of text the bot can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKey {
    Greeting,
    ChooseLanguage,
    BrandName,
    BusinessType,
    City,
    Address,
    Phones,
    Socials,
    Services,
    ServiceDuration,
    WorkDays,
    WorkHours,
    SpecialistsCount,
    LogoUrl,
    ColorsEmojis,
    ContactInfo,
    TechContact,
    HostingNeeded,
    ExtraFeatures,
    HostingYes,
    HostingNo,
    NotProvided,
    Completed,
    SubmitFailed,
    NotStarted,
}

impl PromptKey {
    pub const ALL: [PromptKey; 25] = [
        PromptKey::Greeting,
        PromptKey::ChooseLanguage,
        PromptKey::BrandName,
        PromptKey::BusinessType,
        PromptKey::City,
        PromptKey::Address,
        PromptKey::Phones,
        PromptKey::Socials,
        PromptKey::Services,
        PromptKey::ServiceDuration,
        PromptKey::WorkDays,
        PromptKey::WorkHours,
        PromptKey::SpecialistsCount,
        PromptKey::LogoUrl,
        PromptKey::ColorsEmojis,
        PromptKey::ContactInfo,
        PromptKey::TechContact,
        PromptKey::HostingNeeded,
        PromptKey::ExtraFeatures,
        PromptKey::HostingYes,
        PromptKey::HostingNo,
        PromptKey::NotProvided,
        PromptKey::Completed,
        PromptKey::SubmitFailed,
        PromptKey::NotStarted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ChooseLanguage => "choose_language",
            Self::BrandName => "brand_name",
            Self::BusinessType => "business_type",
            Self::City => "city",
            Self::Address => "address",
            Self::Phones => "phones",
            Self::Socials => "socials",
            Self::Services => "services",
            Self::ServiceDuration => "service_duration",
            Self::WorkDays => "work_days",
            Self::WorkHours => "work_hours",
            Self::SpecialistsCount => "specialists_count",
            Self::LogoUrl => "logo_url",
            Self::ColorsEmojis => "colors_emojis",
            Self::ContactInfo => "contact_info",
            Self::TechContact => "tech_contact",
            Self::HostingNeeded => "hosting_needed",
            Self::ExtraFeatures => "extra_features",
            Self::HostingYes => "hosting_yes",
            Self::HostingNo => "hosting_no",
            Self::NotProvided => "not_provided",
            Self::Completed => "completed",
            Self::SubmitFailed => "submit_failed",
            Self::NotStarted => "not_started",
        }
    }
}

impl std::fmt::Display for PromptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated (language, prompt key) → text mapping.
#[derive(Debug, Clone)]
pub struct LocaleTable {
    texts: HashMap<(Language, PromptKey), String>,
}

impl LocaleTable {
    /// Load the table embedded in the binary.
    pub fn builtin() -> Result<Self, LocaleError> {
        Self::from_json_str(BUILTIN_LOCALES)
    }

    /// Load an override table from disk.
    pub fn from_path(path: &Path) -> Result<Self, LocaleError> {
        let raw = std::fs::read_to_string(path).map_err(|e| LocaleError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON locale document.
    pub fn from_json_str(raw: &str) -> Result<Self, LocaleError> {
        let document: HashMap<PromptKey, HashMap<Language, String>> = serde_json::from_str(raw)?;

        let mut texts = HashMap::with_capacity(PromptKey::ALL.len() * Language::ALL.len());
        for (key, by_language) in document {
            for (language, text) in by_language {
                texts.insert((language, key), text);
            }
        }

        let table = Self { texts };
        table.validate()?;
        Ok(table)
    }

    /// Every key must be present and non-empty for every language.
    fn validate(&self) -> Result<(), LocaleError> {
        for key in PromptKey::ALL {
            for language in Language::ALL {
                let present = self
                    .texts
                    .get(&(language, key))
                    .is_some_and(|t| !t.trim().is_empty());
                if !present {
                    return Err(LocaleError::MissingText {
                        language: language.to_string(),
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Text for `key` in `language`.
    pub fn lookup(&self, language: Language, key: PromptKey) -> &str {
        self.texts
            .get(&(language, key))
            .or_else(|| self.texts.get(&(Language::FALLBACK, key)))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_passes_parity_check() {
        let table = LocaleTable::builtin().unwrap();
        for language in Language::ALL {
            for key in PromptKey::ALL {
                assert!(
                    !table.lookup(language, key).is_empty(),
                    "{key} missing for {language}"
                );
            }
        }
    }

    #[test]
    fn missing_language_entry_is_rejected() {
        let mut document: serde_json::Value = serde_json::from_str(BUILTIN_LOCALES).unwrap();
        document["city"].as_object_mut().unwrap().remove("es");

        let err = LocaleTable::from_json_str(&document.to_string()).unwrap_err();
        match err {
            LocaleError::MissingText { language, key } => {
                assert_eq!(language, "es");
                assert_eq!(key, "city");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut document: serde_json::Value = serde_json::from_str(BUILTIN_LOCALES).unwrap();
        document["completed"]["en"] = serde_json::json!("   ");

        assert!(matches!(
            LocaleTable::from_json_str(&document.to_string()),
            Err(LocaleError::MissingText { .. })
        ));
    }

    #[test]
    fn unknown_prompt_key_is_a_parse_error() {
        let mut document: serde_json::Value = serde_json::from_str(BUILTIN_LOCALES).unwrap();
        document["favourite_color"] = serde_json::json!({"ru": "x", "en": "x", "es": "x"});

        assert!(matches!(
            LocaleTable::from_json_str(&document.to_string()),
            Err(LocaleError::Parse(_))
        ));
    }

    #[test]
    fn unsupported_code_falls_back() {
        let table = LocaleTable::builtin().unwrap();
        assert_eq!(
            table.lookup(Language::resolve("de"), PromptKey::City),
            table.lookup(Language::FALLBACK, PromptKey::City)
        );
        assert_eq!(
            table.lookup(Language::resolve("EN"), PromptKey::HostingYes),
            "Yes"
        );
    }

    #[test]
    fn language_codes_parse() {
        assert_eq!(Language::from_code("ru"), Some(Language::Ru));
        assert_eq!(Language::from_code(" lang_en "), Some(Language::En));
        assert_eq!(Language::from_code("Español"), Some(Language::Es));
        assert_eq!(Language::from_code("fr"), None);
        assert_eq!(Language::resolve("fr"), Language::FALLBACK);
        assert_eq!(Language::Es.callback_data(), "lang_es");
    }

    #[test]
    fn prompt_key_display_matches_serde() {
        for key in PromptKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(format!("\"{key}\""), json, "Display and serde should match for {key:?}");
        }
    }
}
