//! Configuration module for the Ayame bot.
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,

    /// Bot username (without @).
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Owner user IDs (comma-separated)
    /// These users bypass all permission checks.
    pub owner_ids: Vec<u64>,

    /// Chat ID of the audit log channel (optional).
    pub log_channel_id: Option<i64>,

    /// Language code for user-visible replies.
    pub locale: String,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if required environment variables are not set.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        // Parse owner IDs
        let owner_ids = env::var("OWNER_IDS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| s.trim().parse::<u64>().ok())
            .collect();

        // Parse bot username (strip @ if present)
        let bot_username = env::var("BOT_USERNAME")
            .ok()
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        let log_channel_id = env::var("LOG_CHANNEL_ID")
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok());

        Self {
            bot_token: env::var("BOT_TOKEN").expect("BOT_TOKEN must be set"),
            bot_username,
            owner_ids,
            log_channel_id,
            locale: env::var("BOT_LOCALE").unwrap_or_else(|_| "en".to_string()),
            mongodb_uri: env::var("MONGODB_URI").expect("MONGODB_URI must be set"),
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "ayame".to_string()),
        }
    }
}
