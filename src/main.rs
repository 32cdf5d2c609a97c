//! Ayame - Telegram group moderation bot.
//!
//! Two moderation features on top of a teloxide dispatcher:
//! AFK (away status) tracking and an antiflood guard.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration (users + flood settings)
//! - `permissions` - Admin checking with caching
//! - `bot` - Dispatcher wiring (with Throttle for API rate limiting)
//! - `plugins` - Command handlers
//! - `events` - Per-message handlers (flood counter, AFK watcher)
//! - `audit` - Log-channel sink for moderation actions
//! - `i18n` - User-visible strings
//! - `utils` - Utility functions

mod audit;
mod bot;
mod config;
mod database;
mod events;
mod i18n;
mod permissions;
mod plugins;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use database::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // Initialize logging with sensible defaults
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ayame=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Ayame bot...");

    // Load configuration and translations
    let config = Config::from_env();
    info!("Configuration loaded successfully");

    i18n::init();

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    let db = Arc::new(db);
    info!("Database connected");

    // Initialize bot with Throttle for automatic rate limiting
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    // Get bot info
    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if let Some(channel) = config.log_channel_id {
        info!("Audit log channel: {}", channel);
    }

    // Build and run the dispatcher
    let dispatcher = bot::build_dispatcher(bot, db, &config, bot_username);
    bot::run(dispatcher).await;

    Ok(())
}
