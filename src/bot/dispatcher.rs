//! Message dispatcher setup.
//!
//! Builds the dispatcher with the command handlers and event handlers.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::database::{Database, FloodSettingsRepo, UserRepo};
use crate::events::{self, FloodGuard};
use crate::permissions::Permissions;
use crate::plugins;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Permission checker with admin caching.
    pub permissions: Permissions,

    /// User repository: tracking, mention resolution and AFK state.
    pub users: Arc<UserRepo>,

    /// Per-chat flood settings.
    pub flood_settings: Arc<FloodSettingsRepo>,

    /// Audit log sink.
    pub audit: AuditLog,

    /// Language code for user-visible replies.
    pub locale: String,

    /// Bot username (without @) for addressed-command matching.
    pub bot_username: String,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        bot: ThrottledBot,
        db: Arc<Database>,
        config: &Config,
        bot_username: String,
    ) -> Self {
        // Permissions needs the inner Bot for API calls
        let permissions =
            Permissions::with_owners(bot.inner().clone(), config.owner_ids.clone());

        let users = Arc::new(UserRepo::new(&db));
        let flood_settings = Arc::new(FloodSettingsRepo::new(&db));
        let audit = AuditLog::new(bot, config.log_channel_id);

        Self {
            permissions,
            users,
            flood_settings,
            audit,
            locale: config.locale.clone(),
            bot_username,
        }
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    db: Arc<Database>,
    config: &Config,
    bot_username: String,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    let state = AppState::new(bot.clone(), db, config, bot_username);
    let flood_guard = FloodGuard::new();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state, flood_guard])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // User tracking first (feeds mention resolution), then the
    // pre-command watchers (AFK return + flood counting run for
    // command messages too), then commands, then the leftover group
    // message handler
    let message_handler = Update::filter_message()
        .inspect_async(track_user)
        .inspect_async(events::watch_message)
        .branch(plugins::command_handler())
        .branch(events::message_event_handler());

    dptree::entry().branch(message_handler)
}

/// Track user from message (runs before all handlers).
async fn track_user(msg: Message, state: AppState) {
    if let Some(user) = msg.from.as_ref() {
        state.users.clone().upsert_background(user.clone());
    }
}
