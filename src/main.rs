mod config;
mod ledger;
mod telegram;
mod whatsapp;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use config::{Config, Transport};
use ledger::{Database, LedgerMirror, MessageRouter, Notifier, RemoteMirror, WindowResolver};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ledgerbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("ledgerbot.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting ledgerbot...");
    info!("Loaded config from {config_path}");
    info!("Transport: {:?}, timezone: {}", config.transport, config.timezone);

    let db = match Database::open(&config.data_dir.join("ledger.db")) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open ledger database: {e}");
            std::process::exit(1);
        }
    };

    let mirror: Arc<dyn LedgerMirror> = Arc::new(RemoteMirror::new(config.mirror.as_ref()));
    match config.mirror {
        Some(ref m) => info!("Mirror enabled at {}", m.url),
        None => info!("Mirror not configured, totals come from the local store"),
    }
    let windows = WindowResolver::new(config.timezone);

    match config.transport {
        Transport::Telegram => {
            let bot = Bot::new(&config.telegram_bot_token);
            let notifier: Arc<dyn Notifier> = Arc::new(telegram::TelegramNotifier::new(bot.clone()));
            let router = Arc::new(MessageRouter::new(db, mirror, notifier, windows));
            telegram::run(bot, router).await;
        }
        Transport::Whatsapp => {
            // Config validation guarantees the section for this transport.
            let Some(ref wa) = config.whatsapp else {
                error!("WhatsApp transport selected without a whatsapp section");
                std::process::exit(1);
            };
            let notifier: Arc<dyn Notifier> = Arc::new(whatsapp::GraphClient::new(wa));
            let router = Arc::new(MessageRouter::new(db, mirror, notifier, windows));
            if let Err(e) = whatsapp::run(wa, router).await {
                error!("Webhook server failed: {e}");
                std::process::exit(1);
            }
        }
    }

    info!("👋 ledgerbot stopped");
}
