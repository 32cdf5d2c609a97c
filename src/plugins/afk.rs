//! AFK command handlers and watcher.
//!
//! Users mark themselves away with /afk (or "brb"); any later message
//! from them clears the status, and messages mentioning or replying to
//! an away user get a status notice.

use std::collections::HashSet;

use teloxide::prelude::*;
use teloxide::types::{MessageEntityKind, ParseMode, ReplyParameters, User};
use tracing::{debug, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::UserRecord;
use crate::i18n::get_text;
use crate::utils::{format_duration_full, html_escape};

/// Telegram's own service account. It relays channel posts and system
/// notices and must never gain or lose AFK state.
const TELEGRAM_SERVICE_USER_ID: u64 = 777000;

/// Handle /afk command - set AFK status.
///
/// Usage: /afk [reason]
pub async fn afk_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let user = match msg.from.as_ref() {
        Some(u) => u,
        None => return Ok(()),
    };
    if user.id.0 == TELEGRAM_SERVICE_USER_ID {
        return Ok(());
    }

    let reason = command_reason(msg.text().unwrap_or(""));
    set_afk_and_announce(&bot, &msg, &state, user, reason).await
}

/// Handle /brb command - alias for /afk.
pub async fn brb_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    afk_command(bot, msg, state).await
}

/// Clear the sender's AFK state when they show activity.
///
/// Runs before command dispatch so any message clears the status,
/// commands included; only the messages that set AFK (/afk, /brb, a
/// bare "brb") are exempt. Join events clear silently.
pub async fn watch_afk_return(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<()> {
    let user = match msg.from.as_ref() {
        Some(u) => u,
        // Channel posts have no identifiable sender
        None => return Ok(()),
    };
    if user.is_bot || user.id.0 == TELEGRAM_SERVICE_USER_ID {
        return Ok(());
    }

    if is_afk_set_trigger(msg.text().unwrap_or(""), &state.bot_username) {
        return Ok(());
    }

    let Some(previous) = state.users.clear_afk(user.id.0).await? else {
        return Ok(());
    };

    // Joining a chat is not the user's own "I'm back" action
    if msg.new_chat_members().is_none() {
        let duration = format_duration_full(previous.afk_duration_secs());

        bot.send_message(
            msg.chat.id,
            get_text(&state.locale, "afk.no_longer_afk")
                .replace("{name}", &html_escape(&user.first_name))
                .replace("{duration}", &duration),
        )
        .parse_mode(ParseMode::Html)
        .disable_notification(true)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    }

    Ok(())
}

/// AFK watcher - endpoint for the group messages the command branch
/// left over.
///
/// A bare "brb" message sets AFK like the command does. Independently,
/// every message is scanned for references to away users and a notice
/// is sent per distinct subject. The return step runs separately,
/// before command dispatch, in `watch_afk_return`.
pub async fn afk_watcher(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let user = match msg.from.as_ref() {
        Some(u) => u.clone(),
        None => return Ok(()),
    };
    if user.id.0 == TELEGRAM_SERVICE_USER_ID {
        return Ok(());
    }

    let text = msg.text().unwrap_or("");

    if !user.is_bot && is_brb_trigger(text) {
        let reason = command_reason(text);
        set_afk_and_announce(&bot, &msg, &state, &user, reason).await?;
    }

    announce_subjects(&bot, &msg, &state, user.id.0).await
}

/// Set AFK state for the sender and announce it in-chat.
async fn set_afk_and_announce(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    user: &User,
    reason: Option<String>,
) -> anyhow::Result<()> {
    state.users.set_afk(user, reason).await?;

    info!("User {} went AFK in chat {}", user.id, msg.chat.id);

    bot.send_message(
        msg.chat.id,
        get_text(&state.locale, "afk.now_afk")
            .replace("{name}", &html_escape(&user.first_name)),
    )
    .parse_mode(ParseMode::Html)
    .reply_parameters(ReplyParameters::new(msg.id))
    .await?;

    Ok(())
}

/// Announce away status for every distinct user this message refers to.
///
/// Mention entities take precedence; the reply-to sender is only
/// considered when the message has no mention entities at all.
async fn announce_subjects(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    sender_id: u64,
) -> anyhow::Result<()> {
    let text = msg.text().unwrap_or("");
    let entities = msg.entities().unwrap_or_default();

    let mentions: Vec<_> = entities
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                MessageEntityKind::Mention | MessageEntityKind::TextMention { .. }
            )
        })
        .collect();

    // One notice per distinct subject per message
    let mut seen: HashSet<u64> = HashSet::new();

    if !mentions.is_empty() {
        for entity in mentions {
            match &entity.kind {
                MessageEntityKind::TextMention { user } => {
                    if !seen.insert(user.id.0) {
                        continue;
                    }
                    let record = state.users.get_by_id(user.id.0).await?;
                    send_afk_notice(bot, msg, state, record.as_ref(), &user.first_name, sender_id)
                        .await?;
                }
                MessageEntityKind::Mention => {
                    let span = text.get(entity.offset..entity.offset + entity.length);
                    let Some(username) = span.map(|s| s.trim_start_matches('@')) else {
                        continue;
                    };

                    // Unknown or unresolvable usernames are skipped silently
                    match state.users.get_by_username(username).await {
                        Ok(Some(record)) => {
                            if !seen.insert(record.user_id) {
                                continue;
                            }
                            let name = record.first_name.clone();
                            send_afk_notice(bot, msg, state, Some(&record), &name, sender_id)
                                .await?;
                        }
                        Ok(None) => {
                            debug!("No known user for mention @{}", username);
                        }
                        Err(e) => {
                            debug!("Failed to resolve mention @{}: {}", username, e);
                        }
                    }
                }
                _ => {}
            }
        }
    } else if let Some(reply) = msg.reply_to_message()
        && let Some(reply_user) = reply.from.as_ref()
    {
        let record = state.users.get_by_id(reply_user.id.0).await?;
        send_afk_notice(
            bot,
            msg,
            state,
            record.as_ref(),
            &reply_user.first_name,
            sender_id,
        )
        .await?;
    }

    Ok(())
}

/// Send the away notice for one subject, if one is warranted.
async fn send_afk_notice(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
    record: Option<&UserRecord>,
    display_name: &str,
    sender_id: u64,
) -> anyhow::Result<()> {
    let Some(record) = record else {
        return Ok(());
    };
    let Some(notice) = afk_notice(record, display_name, sender_id, &state.locale) else {
        return Ok(());
    };

    bot.send_message(msg.chat.id, notice)
        .parse_mode(ParseMode::Html)
        .disable_notification(true)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

/// Build the away notice text for a subject, or None when no notice is due.
///
/// A user referencing themself is never announced, and the reason is
/// only surfaced when one was given.
fn afk_notice(
    record: &UserRecord,
    display_name: &str,
    sender_id: u64,
    locale: &str,
) -> Option<String> {
    if !record.is_afk || record.user_id == sender_id {
        return None;
    }

    let text = match &record.afk_reason {
        Some(reason) => get_text(locale, "afk.is_afk_reason")
            .replace("{name}", &html_escape(display_name))
            .replace("{reason}", &html_escape(reason)),
        None => get_text(locale, "afk.is_afk_noreason")
            .replace("{name}", &html_escape(display_name)),
    };

    Some(text)
}

/// Extract the free-text argument of "/afk reason" or "brb reason".
fn command_reason(text: &str) -> Option<String> {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether a plain message is a "brb" away trigger.
fn is_brb_trigger(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|w| w.eq_ignore_ascii_case("brb"))
}

/// Whether a message is one of the AFK-setting triggers.
///
/// These are exempt from the return step: /afk and /brb (optionally
/// addressed to this bot) and the bare "brb" text. /flood, /setflood
/// and every other message clear the sender's away status.
fn is_afk_set_trigger(text: &str, bot_username: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    if first.eq_ignore_ascii_case("brb") {
        return true;
    }

    let Some(command) = first.strip_prefix('/') else {
        return false;
    };
    let (name, target) = match command.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (command, None),
    };

    (name.eq_ignore_ascii_case("afk") || name.eq_ignore_ascii_case("brb"))
        && target.is_none_or(|t| t.eq_ignore_ascii_case(bot_username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n;

    fn afk_record(user_id: u64, reason: Option<&str>) -> UserRecord {
        let mut record = UserRecord {
            user_id,
            username: None,
            username_display: None,
            first_name: "Subject".to_string(),
            last_name: None,
            updated_at: 0,
            is_afk: false,
            afk_reason: None,
            afk_since: None,
        };
        record.set_afk(reason.map(|r| r.to_string()));
        record
    }

    #[test]
    fn test_notice_skipped_for_self_reference() {
        i18n::init();
        let record = afk_record(5, Some("tea"));
        assert!(afk_notice(&record, "Subject", 5, "en").is_none());
    }

    #[test]
    fn test_notice_skipped_when_not_afk() {
        i18n::init();
        let mut record = afk_record(5, None);
        record.clear_afk();
        assert!(afk_notice(&record, "Subject", 9, "en").is_none());
    }

    #[test]
    fn test_notice_with_and_without_reason() {
        i18n::init();

        let with_reason = afk_record(5, Some("tea"));
        let text = afk_notice(&with_reason, "Subject", 9, "en").unwrap();
        assert!(text.contains("tea"));

        let without_reason = afk_record(5, None);
        let text = afk_notice(&without_reason, "Subject", 9, "en").unwrap();
        assert!(!text.contains("Reason"));
    }

    #[test]
    fn test_notice_escapes_html() {
        i18n::init();
        let record = afk_record(5, Some("<b>busy</b>"));
        let text = afk_notice(&record, "A <user>", 9, "en").unwrap();
        assert!(text.contains("&lt;b&gt;busy&lt;/b&gt;"));
        assert!(text.contains("A &lt;user&gt;"));
    }

    #[test]
    fn test_command_reason() {
        assert_eq!(command_reason("/afk grabbing lunch"), Some("grabbing lunch".to_string()));
        assert_eq!(command_reason("/afk"), None);
        assert_eq!(command_reason("/afk   "), None);
        assert_eq!(command_reason("brb food"), Some("food".to_string()));
    }

    #[test]
    fn test_set_triggers_exempt_from_return_step() {
        assert!(is_afk_set_trigger("/afk", "ayamebot"));
        assert!(is_afk_set_trigger("/afk grabbing lunch", "ayamebot"));
        assert!(is_afk_set_trigger("/AFK", "ayamebot"));
        assert!(is_afk_set_trigger("/brb", "ayamebot"));
        assert!(is_afk_set_trigger("/afk@ayamebot tea", "ayamebot"));
        assert!(is_afk_set_trigger("/afk@AyameBot", "ayamebot"));
        assert!(is_afk_set_trigger("brb", "ayamebot"));
        assert!(is_afk_set_trigger("BRB lunch", "ayamebot"));
    }

    #[test]
    fn test_other_commands_still_clear_afk() {
        // Not triggers, so the return step clears the sender's status
        assert!(!is_afk_set_trigger("/flood", "ayamebot"));
        assert!(!is_afk_set_trigger("/setflood 5", "ayamebot"));
        assert!(!is_afk_set_trigger("/afk@otherbot", "ayamebot"));
        assert!(!is_afk_set_trigger("hello there", "ayamebot"));
        assert!(!is_afk_set_trigger("", "ayamebot"));
    }

    #[test]
    fn test_is_brb_trigger() {
        assert!(is_brb_trigger("brb"));
        assert!(is_brb_trigger("BRB lunch"));
        assert!(!is_brb_trigger("brbish"));
        assert!(!is_brb_trigger("see you, brb"));
        assert!(!is_brb_trigger(""));
    }
}
