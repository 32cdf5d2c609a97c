//! Antiflood event handler.
//!
//! Counts consecutive non-admin messages per chat and mutes the sender
//! once the configured limit is reached.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, ParseMode, UserId};
use tracing::{info, warn};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::get_text;
use crate::utils::{html_escape, mention_html};

/// Outcome of recording one message against the flood counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloodAction {
    /// Nothing to do.
    NoAction,
    /// The sender reached the flood limit and should be muted.
    Mute(u64),
}

/// In-memory consecutive-message counters, one per chat.
///
/// The limit lives in `FloodSettingsRepo`; only the live counter is
/// kept here. The read-increment-compare-reset sequence for one chat
/// is atomic (dashmap entry lock); `migrate_chat` takes the write side
/// of `migration` so it is mutually exclusive with every in-flight
/// `record_message` on either chat id.
#[derive(Clone)]
pub struct FloodGuard {
    counters: Arc<DashMap<i64, u32>>,
    migration: Arc<RwLock<()>>,
}

impl FloodGuard {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            migration: Arc::new(RwLock::new(())),
        }
    }

    /// Record a message and decide whether the sender must be muted.
    ///
    /// Admin messages reset the chat's counter: an admin posting is
    /// taken as evidence the flood has been handled. A limit of 0
    /// means detection is disabled and nothing is tracked. When the
    /// counter reaches the limit it is reset to 0 before returning,
    /// so it is never observable at or above the limit.
    pub fn record_message(
        &self,
        chat_id: i64,
        user_id: u64,
        limit: u32,
        is_admin: bool,
    ) -> FloodAction {
        let _migration = self.migration.read();

        if is_admin {
            self.counters.remove(&chat_id);
            return FloodAction::NoAction;
        }

        if limit == 0 {
            return FloodAction::NoAction;
        }

        let mut count = self.counters.entry(chat_id).or_insert(0);
        *count += 1;

        if *count >= limit {
            *count = 0;
            FloodAction::Mute(user_id)
        } else {
            FloodAction::NoAction
        }
    }

    /// Drop the counter for a chat.
    pub fn reset(&self, chat_id: i64) {
        self.counters.remove(&chat_id);
    }

    /// Carry the counter over to a new chat id after a chat migration.
    pub fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) {
        let _migration = self.migration.write();

        if let Some((_, count)) = self.counters.remove(&old_chat_id) {
            self.counters.insert(new_chat_id, count);
        }
    }
}

impl Default for FloodGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Check one group message against the flood counter.
pub async fn check_flood(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    guard: &FloodGuard,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    // Channel posts have no identifiable sender
    let user = match msg.from.as_ref() {
        Some(u) => u,
        None => return Ok(()),
    };
    if user.is_bot {
        return Ok(());
    }
    let user_id = user.id;

    let settings = state.flood_settings.get_or_default(chat_id.0).await?;
    if !settings.is_enabled() {
        return Ok(());
    }

    let is_admin = state
        .permissions
        .is_admin(chat_id, user_id)
        .await
        .unwrap_or(false);

    match guard.record_message(chat_id.0, user_id.0, settings.limit, is_admin) {
        FloodAction::NoAction => Ok(()),
        FloodAction::Mute(offender) => apply_mute(bot, msg, state, guard, offender).await,
    }
}

/// Revoke the offender's send permission and announce the outcome.
///
/// When Telegram rejects the restriction (bot lacks rights), flood
/// detection is disabled for the chat instead of erroring again on
/// every subsequent message.
pub async fn apply_mute(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    guard: &FloodGuard,
    user_id: u64,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;
    let locale = &state.locale;
    let first_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_default();
    let chat_title = msg.chat.title().unwrap_or_default();

    match bot
        .restrict_chat_member(chat_id, UserId(user_id), ChatPermissions::empty())
        .await
    {
        Ok(_) => {
            info!("Flood-muted user {} in chat {}", user_id, chat_id);

            bot.send_message(
                chat_id,
                get_text(locale, "flood.muted")
                    .replace("{mention}", &mention_html(user_id, &first_name)),
            )
            .parse_mode(ParseMode::Html)
            .await?;

            state
                .audit
                .record(
                    get_text(locale, "flood.log_muted")
                        .replace("{title}", &html_escape(chat_title))
                        .replace("{mention}", &mention_html(user_id, &first_name)),
                )
                .await;
        }
        Err(teloxide::RequestError::Api(api_err)) => {
            warn!(
                "Cannot restrict in chat {} ({}), disabling antiflood",
                chat_id, api_err
            );

            bot.send_message(chat_id, get_text(locale, "flood.no_permission"))
                .await?;

            state.flood_settings.set_limit(chat_id.0, 0).await?;
            guard.reset(chat_id.0);

            state
                .audit
                .record(
                    get_text(locale, "flood.log_mute_failed")
                        .replace("{title}", &html_escape(chat_title)),
                )
                .await;
        }
        Err(e) => {
            warn!("Failed to restrict user {} in chat {}: {}", user_id, chat_id, e);
        }
    }

    Ok(())
}

/// Move all flood state from one chat id to another.
pub async fn migrate_chat(
    state: &AppState,
    guard: &FloodGuard,
    old_chat_id: i64,
    new_chat_id: i64,
) -> anyhow::Result<()> {
    guard.migrate_chat(old_chat_id, new_chat_id);
    state
        .flood_settings
        .migrate_chat(old_chat_id, new_chat_id)
        .await?;

    info!("Migrated chat {} -> {}", old_chat_id, new_chat_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: i64 = -100_123;
    const USER: u64 = 42;

    #[test]
    fn test_mute_on_limit_then_counter_restarts() {
        let guard = FloodGuard::new();

        assert_eq!(guard.record_message(CHAT, USER, 3, false), FloodAction::NoAction);
        assert_eq!(guard.record_message(CHAT, USER, 3, false), FloodAction::NoAction);
        assert_eq!(guard.record_message(CHAT, USER, 3, false), FloodAction::Mute(USER));

        // Counter was reset on mute: the next message counts as the first
        assert_eq!(guard.record_message(CHAT, USER, 3, false), FloodAction::NoAction);
        assert_eq!(*guard.counters.get(&CHAT).unwrap(), 1);
    }

    #[test]
    fn test_admin_message_resets_counter() {
        let guard = FloodGuard::new();

        guard.record_message(CHAT, USER, 5, false);
        guard.record_message(CHAT, USER, 5, false);
        assert_eq!(guard.record_message(CHAT, 7, 5, true), FloodAction::NoAction);

        // Count restarts from zero after the admin spoke
        for _ in 0..4 {
            assert_eq!(guard.record_message(CHAT, USER, 5, false), FloodAction::NoAction);
        }
        assert_eq!(guard.record_message(CHAT, USER, 5, false), FloodAction::Mute(USER));
    }

    #[test]
    fn test_disabled_chat_tracks_nothing() {
        let guard = FloodGuard::new();

        for _ in 0..10 {
            assert_eq!(guard.record_message(CHAT, USER, 0, false), FloodAction::NoAction);
        }
        assert!(guard.counters.get(&CHAT).is_none());
    }

    #[test]
    fn test_counter_never_observable_at_limit() {
        let guard = FloodGuard::new();

        for i in 1..=20u32 {
            let action = guard.record_message(CHAT, USER, 4, false);
            let count = *guard.counters.get(&CHAT).unwrap();
            assert!(count < 4, "count {} at message {}", count, i);
            if i % 4 == 0 {
                assert_eq!(action, FloodAction::Mute(USER));
            } else {
                assert_eq!(action, FloodAction::NoAction);
            }
        }
    }

    #[test]
    fn test_lowered_limit_still_resets() {
        let guard = FloodGuard::new();

        guard.record_message(CHAT, USER, 10, false);
        guard.record_message(CHAT, USER, 10, false);
        guard.record_message(CHAT, USER, 10, false);

        // Limit lowered below the accumulated count: mute and reset
        assert_eq!(guard.record_message(CHAT, USER, 3, false), FloodAction::Mute(USER));
        assert_eq!(*guard.counters.get(&CHAT).unwrap(), 0);
    }

    #[test]
    fn test_migrate_carries_counter() {
        let guard = FloodGuard::new();
        let new_chat = CHAT - 1;

        guard.record_message(CHAT, USER, 5, false);
        guard.record_message(CHAT, USER, 5, false);

        guard.migrate_chat(CHAT, new_chat);
        assert!(guard.counters.get(&CHAT).is_none());

        // Two messages carried over; the fifth overall triggers the mute
        assert_eq!(guard.record_message(new_chat, USER, 5, false), FloodAction::NoAction);
        assert_eq!(guard.record_message(new_chat, USER, 5, false), FloodAction::NoAction);
        assert_eq!(guard.record_message(new_chat, USER, 5, false), FloodAction::Mute(USER));
    }

    #[test]
    fn test_migrate_without_state_is_a_noop() {
        let guard = FloodGuard::new();
        guard.migrate_chat(CHAT, CHAT - 1);
        assert!(guard.counters.get(&(CHAT - 1)).is_none());
    }

    #[test]
    fn test_reset_drops_counter() {
        let guard = FloodGuard::new();
        guard.record_message(CHAT, USER, 5, false);
        guard.reset(CHAT);
        assert!(guard.counters.get(&CHAT).is_none());
    }
}
