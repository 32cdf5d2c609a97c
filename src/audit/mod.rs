//! Audit log sink.
//!
//! Moderation actions produce structured text entries; each entry is
//! mirrored to tracing and, when LOG_CHANNEL_ID is configured, posted
//! to the log channel as HTML.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{info, warn};

use crate::bot::dispatcher::ThrottledBot;

/// Sink for structured moderation log entries.
#[derive(Clone)]
pub struct AuditLog {
    bot: ThrottledBot,
    channel: Option<ChatId>,
}

impl AuditLog {
    pub fn new(bot: ThrottledBot, channel_id: Option<i64>) -> Self {
        Self {
            bot,
            channel: channel_id.map(ChatId),
        }
    }

    /// Record one entry. A failing channel post never fails the caller.
    pub async fn record(&self, entry: String) {
        info!(target: "audit", "{}", entry.replace('\n', " | "));

        if let Some(channel) = self.channel
            && let Err(e) = self
                .bot
                .send_message(channel, entry)
                .parse_mode(ParseMode::Html)
                .await
        {
            warn!("Failed to post audit entry to log channel: {}", e);
        }
    }
}
