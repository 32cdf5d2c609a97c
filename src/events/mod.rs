//! Event handler system.
//!
//! Per-message handlers that run outside the command tree: flood
//! counting, chat-migration bookkeeping, and the AFK watcher.

pub mod antiflood;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::error;

pub use antiflood::FloodGuard;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::plugins::afk;

/// Watch one incoming group message before command dispatch.
///
/// Runs for every group message, command-shaped or not: chat-migration
/// bookkeeping, the AFK return step, and flood counting. Each step is
/// isolated so one failing never blocks the others or the command
/// branch that runs next.
pub async fn watch_message(bot: ThrottledBot, msg: Message, state: AppState, guard: FloodGuard) {
    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        return;
    }

    // Chat upgraded to a supergroup: carry flood state to the new id
    if let Some(new_chat_id) = msg.migrate_to_chat_id() {
        if let Err(e) = antiflood::migrate_chat(&state, &guard, msg.chat.id.0, new_chat_id.0).await
        {
            error!("Chat migration error: {}", e);
        }
        return;
    }

    if let Err(e) = afk::watch_afk_return(&bot, &msg, &state).await {
        error!("AFK return error: {}", e);
    }

    if !flood_exempt(&msg) {
        if let Err(e) = antiflood::check_flood(&bot, &msg, &state, &guard).await {
            error!("Antiflood error: {}", e);
        }
    }
}

/// Handle the group messages the command branch left over.
pub fn message_event_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
        .endpoint(afk::afk_watcher)
}

/// Join and leave service messages do not count toward the flood.
fn flood_exempt(msg: &Message) -> bool {
    msg.new_chat_members().is_some() || msg.left_chat_member().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_command_shaped_messages_count_toward_flood() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": -100_123, "type": "supergroup", "title": "group" },
            "from": { "id": 42, "is_bot": false, "first_name": "Spammer" },
            "text": "/spamspamspam",
            "entities": [{ "type": "bot_command", "offset": 0, "length": 13 }]
        }));
        assert!(!flood_exempt(&msg));
    }

    #[test]
    fn test_plain_messages_count_toward_flood() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": -100_123, "type": "supergroup", "title": "group" },
            "from": { "id": 42, "is_bot": false, "first_name": "A" },
            "text": "hello",
            "entities": []
        }));
        assert!(!flood_exempt(&msg));
    }

    #[test]
    fn test_join_and_leave_messages_are_exempt() {
        let join = message(serde_json::json!({
            "message_id": 2,
            "date": 1,
            "chat": { "id": -100_123, "type": "supergroup", "title": "group" },
            "from": { "id": 42, "is_bot": false, "first_name": "A" },
            "new_chat_members": [{ "id": 7, "is_bot": false, "first_name": "B" }]
        }));
        assert!(flood_exempt(&join));

        let leave = message(serde_json::json!({
            "message_id": 3,
            "date": 1,
            "chat": { "id": -100_123, "type": "supergroup", "title": "group" },
            "from": { "id": 42, "is_bot": false, "first_name": "A" },
            "left_chat_member": { "id": 7, "is_bot": false, "first_name": "B" }
        }));
        assert!(flood_exempt(&leave));
    }
}
