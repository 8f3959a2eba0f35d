//! Google Sheets sink — appends rows through the Sheets v4 REST API.
//!
//! Authenticates as a service account: an RS256-signed JWT assertion is
//! exchanged at the key's `token_uri` for a bearer token, which is cached
//! until shortly before it expires.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::SubmissionSink;
use crate::error::SinkError;

/// OAuth scope needed to append values.
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Default Sheets API origin.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Default append range: the first worksheet.
pub const DEFAULT_RANGE: &str = "A1";

/// Default per-request timeout for token and append calls.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Lifetime requested for the JWT assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the cached token this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The subset of a service-account key file the sink needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub private_key: SecretString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl ServiceAccountKey {
    /// Decode a base64-encoded key file. Missing `=` padding is tolerated.
    pub fn from_base64(encoded: &str) -> Result<Self, SinkError> {
        let mut cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let remainder = cleaned.len() % 4;
        if remainder != 0 {
            cleaned.push_str(&"=".repeat(4 - remainder));
        }

        let bytes = STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| SinkError::Credentials(format!("base64 decode failed: {e}")))?;
        Self::from_json_bytes(&bytes)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, SinkError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SinkError::Credentials(format!("invalid key JSON: {e}")))
    }
}

/// Where rows go.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// A1-notation range; rows are appended after the table found there.
    pub range: String,
    pub api_base: String,
    /// Upper bound on each HTTP call; a hung request fails instead of
    /// stalling the message loop.
    pub timeout: StdDuration,
}

impl SheetsConfig {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            range: DEFAULT_RANGE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Appends rows to one spreadsheet as a service account.
pub struct GoogleSheetsSink {
    client: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    config: SheetsConfig,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsSink {
    /// Build the sink. Fails if the private key is not a valid RSA PEM.
    pub fn new(key: ServiceAccountKey, config: SheetsConfig) -> Result<Self, SinkError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| SinkError::Credentials(format!("invalid private key: {e}")))?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            config,
            token: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, fetching a new one if needed.
    async fn access_token(&self) -> Result<String, SinkError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> Result<CachedToken, SinkError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| SinkError::Auth(format!("failed to sign assertion: {e}")))?;

        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = resp.json().await?;
        tracing::debug!(expires_in = token.expires_in, "Fetched Sheets access token");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }

    fn append_url(&self) -> Result<reqwest::Url, SinkError> {
        let mut url = reqwest::Url::parse(&self.config.api_base)
            .map_err(|e| SinkError::Unavailable(format!("invalid API base: {e}")))?;
        let last = format!("{}:append", self.config.range);
        url.path_segments_mut()
            .map_err(|_| SinkError::Unavailable("API base cannot hold a path".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                last.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl SubmissionSink for GoogleSheetsSink {
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        let token = self.access_token().await?;
        let url = self.append_url()?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected { status, body });
        }

        tracing::info!(
            spreadsheet = %self.config.spreadsheet_id,
            cells = row.len(),
            "Row appended"
        );
        Ok(())
    }
}
