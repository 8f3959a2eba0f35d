use std::sync::Arc;

use secrecy::ExposeSecret;

use intake_bot::bot::IntakeBot;
use intake_bot::channels::TelegramChannel;
use intake_bot::config::BotConfig;
use intake_bot::error::Result;
use intake_bot::intake::{LocaleTable, Sequencer, SessionStore};
use intake_bot::routes::{StatusRouteState, status_routes};
use intake_bot::sink::{GoogleSheetsSink, SheetsConfig, SubmissionSink};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("  Required: CONSULTANT_BOT_TOKEN, TZ_SPREADSHEET_ID, GOOGLE_CREDENTIALS");
            return Err(e.into());
        }
    };

    // ── Localization ─────────────────────────────────────────────────────
    let locale = match config.locales_path.as_deref() {
        Some(path) => LocaleTable::from_path(path)?,
        None => LocaleTable::builtin()?,
    };

    eprintln!("📝 Intake bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Variant: {}", config.variant);
    eprintln!("   Spreadsheet: {} ({})", config.spreadsheet_id, config.sheet_range);
    eprintln!("   Service account: {}", config.service_account.client_email);
    eprintln!(
        "   Telegram: allowed {}",
        if config.allowed_users.iter().any(|u| u == "*") {
            "everyone".to_string()
        } else {
            config.allowed_users.join(", ")
        }
    );
    eprintln!("   Status: http://0.0.0.0:{}/health\n", config.http_port);

    // ── Sink ─────────────────────────────────────────────────────────────
    let sheets_config = SheetsConfig::new(config.spreadsheet_id.clone())
        .with_range(config.sheet_range.clone())
        .with_timeout(config.sheets_timeout);
    let sink: Arc<dyn SubmissionSink> =
        Arc::new(GoogleSheetsSink::new(config.service_account, sheets_config)?);

    // ── Status routes ────────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new());
    let app = status_routes(StatusRouteState {
        variant: config.variant,
        sessions: Arc::clone(&sessions),
    });
    let http_port = config.http_port;
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(format!("0.0.0.0:{http_port}")).await {
            Ok(listener) => {
                tracing::info!(port = http_port, "Status server started");
                axum::serve(listener, app).await.ok();
            }
            Err(e) => tracing::warn!(port = http_port, "Status server disabled: {}", e),
        }
    });

    // ── Bot ──────────────────────────────────────────────────────────────
    let channel = Arc::new(TelegramChannel::new(
        config.bot_token.expose_secret().to_string(),
        config.allowed_users,
    ));
    let sequencer = Sequencer::new(config.variant, Arc::new(locale));
    let bot = IntakeBot::new(sequencer, sink, sessions);

    bot.run(channel).await?;

    Ok(())
}
