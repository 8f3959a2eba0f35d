//! Startup configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::intake::Variant;
use crate::sink::sheets::{DEFAULT_RANGE, DEFAULT_TIMEOUT, ServiceAccountKey};

/// Default port for the health/status routes.
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Everything the bot needs to start.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token.
    pub bot_token: SecretString,
    /// Target spreadsheet id.
    pub spreadsheet_id: String,
    /// Decoded service-account credentials.
    pub service_account: ServiceAccountKey,
    pub variant: Variant,
    pub sheet_range: String,
    /// Per-request timeout for Google calls.
    pub sheets_timeout: Duration,
    /// Optional override for the built-in locale table.
    pub locales_path: Option<PathBuf>,
    /// Telegram usernames or numeric ids allowed to talk to the bot.
    pub allowed_users: Vec<String>,
    pub http_port: u16,
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Required | Default     |
    /// |------------------------|----------|-------------|
    /// | `CONSULTANT_BOT_TOKEN` | **yes**  | --          |
    /// | `TZ_SPREADSHEET_ID`    | **yes**  | --          |
    /// | `GOOGLE_CREDENTIALS`   | **yes**  | --          |
    /// | `INTAKE_VARIANT`       | no       | `classic`   |
    /// | `INTAKE_SHEET_RANGE`   | no       | `A1`        |
    /// | `INTAKE_SHEETS_TIMEOUT_SECS` | no | `30`        |
    /// | `INTAKE_LOCALES_PATH`  | no       | built-in    |
    /// | `INTAKE_ALLOWED_USERS` | no       | `*`         |
    /// | `INTAKE_HTTP_PORT`     | no       | `8080`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BotConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let bot_token = SecretString::from(required("CONSULTANT_BOT_TOKEN")?);
        let spreadsheet_id = required("TZ_SPREADSHEET_ID")?;
        let service_account = ServiceAccountKey::from_base64(&required("GOOGLE_CREDENTIALS")?)
            .map_err(|e| ConfigError::InvalidValue {
                key: "GOOGLE_CREDENTIALS".into(),
                message: e.to_string(),
            })?;

        let variant = match lookup("INTAKE_VARIANT") {
            Some(raw) => raw
                .parse::<Variant>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "INTAKE_VARIANT".into(),
                    message,
                })?,
            None => Variant::default(),
        };

        let sheet_range = lookup("INTAKE_SHEET_RANGE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_RANGE.to_string());

        let sheets_timeout = match lookup("INTAKE_SHEETS_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "INTAKE_SHEETS_TIMEOUT_SECS".into(),
                        message: format!("'{raw}' is not a positive number of seconds"),
                    });
                }
            },
            None => DEFAULT_TIMEOUT,
        };

        let locales_path = lookup("INTAKE_LOCALES_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let allowed_users: Vec<String> = lookup("INTAKE_ALLOWED_USERS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let http_port = match lookup("INTAKE_HTTP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "INTAKE_HTTP_PORT".into(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        Ok(Self {
            bot_token,
            spreadsheet_id,
            service_account,
            variant,
            sheet_range,
            sheets_timeout,
            locales_path,
            allowed_users,
            http_port,
        })
    }
}
