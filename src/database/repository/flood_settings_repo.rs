//! Flood settings repository with hot caching.
//!
//! The flood limit is read on every group message, so lookups are
//! aggressively cached with a 10 minute TTL.

use std::time::Duration;

use anyhow::Result;
use moka::sync::Cache;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::debug;

use crate::database::Database;
use crate::database::models::FloodSettings;

/// Repository for per-chat flood settings.
pub struct FloodSettingsRepo {
    collection: Collection<FloodSettings>,
    cache: Cache<i64, FloodSettings>,
}

impl FloodSettingsRepo {
    pub fn new(db: &Database) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(600)) // 10 minutes
            .build();

        Self {
            collection: db.collection("flood_settings"),
            cache,
        }
    }

    /// Get settings for a chat, returning disabled defaults if not set.
    pub async fn get_or_default(&self, chat_id: i64) -> Result<FloodSettings> {
        if let Some(settings) = self.cache.get(&chat_id) {
            return Ok(settings);
        }

        let filter = doc! { "chat_id": chat_id };
        let result = self.collection.find_one(filter).await?;

        let settings = result.unwrap_or_else(|| FloodSettings::new(chat_id));
        self.cache.insert(chat_id, settings.clone());

        Ok(settings)
    }

    /// Set the flood limit for a chat (upsert). 0 disables detection.
    pub async fn set_limit(&self, chat_id: i64, limit: u32) -> Result<()> {
        let mut settings = self.get_or_default(chat_id).await?;
        settings.limit = limit;

        let filter = doc! { "chat_id": chat_id };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, &settings)
            .with_options(options)
            .await?;

        self.cache.insert(chat_id, settings);
        debug!("Set flood limit {} for chat {}", limit, chat_id);

        Ok(())
    }

    /// Move flood settings to a new chat ID after a chat migration.
    ///
    /// The settings are carried over verbatim; the old document is
    /// removed once the new one is in place.
    pub async fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) -> Result<()> {
        let filter = doc! { "chat_id": old_chat_id };
        let Some(mut settings) = self.collection.find_one(filter.clone()).await? else {
            self.cache.invalidate(&old_chat_id);
            return Ok(());
        };

        settings.id = None;
        settings.chat_id = new_chat_id;

        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();
        self.collection
            .replace_one(doc! { "chat_id": new_chat_id }, &settings)
            .with_options(options)
            .await?;

        self.collection.delete_one(filter).await?;

        self.cache.invalidate(&old_chat_id);
        self.cache.insert(new_chat_id, settings);
        debug!("Migrated flood settings {} -> {}", old_chat_id, new_chat_id);

        Ok(())
    }
}
