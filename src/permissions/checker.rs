//! Permission checker with caching.

use std::time::Duration;

use moka::sync::Cache;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::debug;

/// Cached admin information.
///
/// Only the rights the flood guard cares about are retained.
#[derive(Clone, Debug)]
pub struct AdminInfo {
    pub is_owner: bool,
    pub can_restrict_members: bool,
}

impl AdminInfo {
    /// Create AdminInfo from a ChatMember.
    fn from_chat_member(member: &ChatMember) -> Option<Self> {
        match &member.kind {
            ChatMemberKind::Owner(_) => Some(Self {
                is_owner: true,
                can_restrict_members: true,
            }),
            ChatMemberKind::Administrator(admin) => Some(Self {
                is_owner: false,
                can_restrict_members: admin.can_restrict_members,
            }),
            _ => None,
        }
    }

    /// AdminInfo for a bot owner (has all rights).
    fn bot_owner() -> Self {
        Self {
            is_owner: true,
            can_restrict_members: true,
        }
    }
}

/// Cache key for admin lookups.
type AdminCacheKey = (i64, u64); // (chat_id, user_id)

/// Permission checker with caching support.
///
/// Bot owners (from OWNER_IDS env) bypass all permission checks.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    cache: Cache<AdminCacheKey, Option<AdminInfo>>,
    owner_ids: Vec<u64>,
}

impl Permissions {
    /// Create a new permission checker with bot owner IDs.
    pub fn with_owners(bot: Bot, owner_ids: Vec<u64>) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .time_to_idle(Duration::from_secs(120))
            .build();

        Self {
            bot,
            cache,
            owner_ids,
        }
    }

    /// Check if a user is a bot owner.
    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Get admin info for a user in a chat.
    ///
    /// Returns `None` if the user is not an admin.
    pub async fn get_admin_info(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<Option<AdminInfo>> {
        if self.is_bot_owner(user_id) {
            debug!("User {} is bot owner, granting all permissions", user_id);
            return Ok(Some(AdminInfo::bot_owner()));
        }

        let cache_key = (chat_id.0, user_id.0);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", user_id, chat_id);
            return Ok(cached);
        }

        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        let result = AdminInfo::from_chat_member(&member);

        // Cache the result (including None for non-admins)
        self.cache.insert(cache_key, result.clone());

        Ok(result)
    }

    /// Check if a user is an admin (including the chat owner).
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            return Ok(true);
        }
        Ok(self.get_admin_info(chat_id, user_id).await?.is_some())
    }

    /// Check if a user can restrict members (mute, ban).
    pub async fn can_restrict_members(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            return Ok(true);
        }
        Ok(self
            .get_admin_info(chat_id, user_id)
            .await?
            .map(|a| a.can_restrict_members)
            .unwrap_or(false))
    }

    /// Invalidate cached admin info for a user.
    ///
    /// Call this when admin status might have changed.
    #[allow(dead_code)]
    pub fn invalidate(&self, chat_id: ChatId, user_id: UserId) {
        self.cache.invalidate(&(chat_id.0, user_id.0));
        debug!(
            "Invalidated admin cache for user {} in chat {}",
            user_id, chat_id
        );
    }
}
