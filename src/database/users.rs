//! User repository with cache-first architecture.
//!
//! Provides user storage and resolution with dual-index caching:
//! - By user ID (primary)
//! - By username (for @username mention resolution)
//!
//! The embedded AFK state is owned by this repository: all reads and
//! writes of a user's away status go through `set_afk` / `clear_afk`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::sync::Cache;
use mongodb::Collection;
use mongodb::bson::doc;
use teloxide::types::User;
use tokio::spawn;
use tracing::{debug, warn};

use super::Database;
use super::models::UserRecord;

/// Repository for user data with dual-index caching.
pub struct UserRepo {
    collection: Collection<UserRecord>,
    cache_by_id: Cache<u64, UserRecord>,
    cache_by_username: Cache<String, u64>, // username (lowercase) -> user_id
}

impl UserRepo {
    /// Create a new UserRepo with caching.
    pub fn new(db: &Database) -> Self {
        let cache_by_id = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600)) // 1 hour
            .build();

        // Shorter TTL so username changes are picked up
        let cache_by_username = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(1800))
            .build();

        Self {
            collection: db.collection("users"),
            cache_by_id,
            cache_by_username,
        }
    }

    /// Upsert user identity data (update or insert).
    ///
    /// Only touches identity fields: the embedded AFK state is left
    /// alone so a plain message never clobbers an active away status.
    pub async fn upsert(&self, user: &User) -> Result<()> {
        let user_id = user.id.0;

        // Skip unnecessary writes when nothing changed
        if let Some(cached) = self.cache_by_id.get(&user_id) {
            if !cached.has_changed(user) {
                return Ok(());
            }
            // Drop a stale username index entry if the username changed
            if let Some(old_username) = &cached.username {
                let new_username = user.username.as_ref().map(|u| u.to_lowercase());
                if Some(old_username.clone()) != new_username {
                    self.cache_by_username.invalidate(old_username);
                }
            }
        }

        let username = user.username.as_ref().map(|u| u.to_lowercase());
        let now = chrono::Utc::now().timestamp();

        let filter = doc! { "user_id": user_id as i64 };
        let update = doc! {
            "$set": {
                "username": username.clone(),
                "username_display": user.username.clone(),
                "first_name": user.first_name.clone(),
                "last_name": user.last_name.clone(),
                "updated_at": now,
            },
            "$setOnInsert": {
                "user_id": user_id as i64,
                "is_afk": false,
            },
        };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .update_one(filter, update)
            .with_options(options)
            .await?;

        // Refetch on next read rather than guessing at the merged doc
        self.cache_by_id.invalidate(&user_id);
        if let Some(username) = username {
            self.cache_by_username.insert(username, user_id);
        }

        debug!("Upserted user {} (@{:?})", user_id, user.username);
        Ok(())
    }

    /// Upsert user in background (non-blocking).
    pub fn upsert_background(self: Arc<Self>, user: User) {
        spawn(async move {
            if let Err(e) = self.upsert(&user).await {
                warn!("Failed to upsert user {}: {}", user.id, e);
            }
        });
    }

    /// Get user by ID.
    pub async fn get_by_id(&self, user_id: u64) -> Result<Option<UserRecord>> {
        if let Some(user) = self.cache_by_id.get(&user_id) {
            return Ok(Some(user));
        }

        let filter = doc! { "user_id": user_id as i64 };
        let result = self.collection.find_one(filter).await?;

        if let Some(user) = &result {
            self.cache_by_id.insert(user_id, user.clone());
            if let Some(username) = &user.username {
                self.cache_by_username.insert(username.clone(), user_id);
            }
        }

        Ok(result)
    }

    /// Get user by username (case-insensitive, without @).
    ///
    /// Returns Ok(None) for usernames the bot has never seen; the
    /// caller is expected to skip those silently.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let username_lower = username.trim_start_matches('@').to_lowercase();

        if let Some(user_id) = self.cache_by_username.get(&username_lower) {
            if let Some(user) = self.cache_by_id.get(&user_id) {
                return Ok(Some(user));
            }
            return self.get_by_id(user_id).await;
        }

        let filter = doc! { "username": &username_lower };
        let result = self.collection.find_one(filter).await?;

        if let Some(user) = &result {
            self.cache_by_id.insert(user.user_id, user.clone());
            self.cache_by_username.insert(username_lower, user.user_id);
        }

        Ok(result)
    }

    /// Mark a user as away, overwriting any previous away status.
    pub async fn set_afk(&self, user: &User, reason: Option<String>) -> Result<()> {
        let user_id = user.id.0;

        let mut record = match self.get_by_id(user_id).await? {
            Some(existing) => existing,
            None => UserRecord::from_telegram(user),
        };
        record.set_afk(reason);

        let filter = doc! { "user_id": user_id as i64 };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, &record)
            .with_options(options)
            .await?;

        if let Some(username) = &record.username {
            self.cache_by_username.insert(username.clone(), user_id);
        }
        self.cache_by_id.insert(user_id, record);

        debug!("User {} is now AFK", user_id);
        Ok(())
    }

    /// Clear a user's away status.
    ///
    /// Atomic per user: the filter only matches while `is_afk` is set,
    /// so concurrent clears succeed at most once per `set_afk`. Returns
    /// the record as it was while away, or None if the user was not away.
    pub async fn clear_afk(&self, user_id: u64) -> Result<Option<UserRecord>> {
        let filter = doc! { "user_id": user_id as i64, "is_afk": true };
        let update = doc! {
            "$set": { "is_afk": false },
            "$unset": { "afk_reason": "", "afk_since": "" },
        };

        let previous = self.collection.find_one_and_update(filter, update).await?;

        if let Some(previous) = &previous {
            let mut updated = previous.clone();
            updated.clear_afk();
            self.cache_by_id.insert(user_id, updated);
            debug!("User {} is no longer AFK", user_id);
        }

        Ok(previous)
    }
}

impl Clone for UserRepo {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            cache_by_id: self.cache_by_id.clone(),
            cache_by_username: self.cache_by_username.clone(),
        }
    }
}
