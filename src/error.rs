//! Error types for the intake bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Locale error: {0}")]
    Locale(#[from] LocaleError),
}

/// Configuration-related errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Errors raised while appending a row to the external store.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Invalid service account credentials: {0}")]
    Credentials(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store rejected the row ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Localization table construction errors.
#[derive(Debug, thiserror::Error)]
pub enum LocaleError {
    #[error("Failed to parse locale table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read locale table {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Missing text for key {key} in language {language}")]
    MissingText { language: String, key: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
