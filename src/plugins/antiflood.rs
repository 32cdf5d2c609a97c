//! Antiflood command handlers.
//!
//! Commands for configuring flood detection in groups.

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::events::FloodGuard;
use crate::i18n::get_text;
use crate::utils::{html_escape, mention_html};

/// Parsed /setflood argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodLimitArg {
    /// Disable flood detection.
    Off,
    /// Enable with the given consecutive-message limit (>= 3).
    Limit(u32),
}

/// Rejected /setflood argument.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetFloodError {
    #[error("the flood limit must be at least 3")]
    TooLow,
    #[error("expected a number, or \"off\" / \"no\"")]
    InvalidArgument,
}

/// Parse the /setflood argument.
///
/// "off", "no" and "0" all disable detection; 1 and 2 are rejected as
/// too low; anything that is not a non-negative integer is rejected.
pub fn parse_setflood_arg(arg: &str) -> Result<FloodLimitArg, SetFloodError> {
    match arg.to_lowercase().as_str() {
        "off" | "no" => Ok(FloodLimitArg::Off),
        val => match val.parse::<u32>() {
            Ok(0) => Ok(FloodLimitArg::Off),
            Ok(n) if n < 3 => Err(SetFloodError::TooLow),
            Ok(n) => Ok(FloodLimitArg::Limit(n)),
            Err(_) => Err(SetFloodError::InvalidArgument),
        },
    }
}

/// Handle /setflood command - set or disable the flood limit.
pub async fn setflood_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    guard: FloodGuard,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        return Ok(());
    }

    let locale = &state.locale;

    // Changing the flood limit requires restrict rights
    if !state
        .permissions
        .can_restrict_members(chat_id, user.id)
        .await
        .unwrap_or(false)
    {
        bot.send_message(chat_id, get_text(locale, "flood.err_no_rights"))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }

    let text = msg.text().unwrap_or("");
    let arg = match text.split_whitespace().nth(1) {
        Some(arg) => arg,
        None => {
            bot.send_message(chat_id, get_text(locale, "flood.setflood_usage"))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
            return Ok(());
        }
    };

    let chat_title = html_escape(msg.chat.title().unwrap_or_default());
    let admin_mention = mention_html(user.id.0, &user.first_name);

    match parse_setflood_arg(arg) {
        Ok(FloodLimitArg::Off) => {
            state.flood_settings.set_limit(chat_id.0, 0).await?;
            guard.reset(chat_id.0);

            bot.send_message(chat_id, get_text(locale, "flood.set_off"))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;

            state
                .audit
                .record(
                    get_text(locale, "flood.log_set_off")
                        .replace("{title}", &chat_title)
                        .replace("{mention}", &admin_mention),
                )
                .await;

            info!("Antiflood disabled in chat {}", chat_id);
        }
        Ok(FloodLimitArg::Limit(limit)) => {
            state.flood_settings.set_limit(chat_id.0, limit).await?;
            guard.reset(chat_id.0);

            bot.send_message(
                chat_id,
                get_text(locale, "flood.set_on").replace("{limit}", &limit.to_string()),
            )
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;

            state
                .audit
                .record(
                    get_text(locale, "flood.log_set_on")
                        .replace("{limit}", &limit.to_string())
                        .replace("{title}", &chat_title)
                        .replace("{mention}", &admin_mention),
                )
                .await;

            info!("Antiflood limit set to {} in chat {}", limit, chat_id);
        }
        Err(SetFloodError::TooLow) => {
            bot.send_message(chat_id, get_text(locale, "flood.err_too_low"))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
        Err(SetFloodError::InvalidArgument) => {
            bot.send_message(chat_id, get_text(locale, "flood.err_bad_arg"))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
    }

    Ok(())
}

/// Handle /flood command - show the current flood limit.
pub async fn flood_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        return Ok(());
    }

    let settings = state.flood_settings.get_or_default(chat_id.0).await?;
    let locale = &state.locale;

    let status = if settings.is_enabled() {
        get_text(locale, "flood.status_on").replace("{limit}", &settings.limit.to_string())
    } else {
        get_text(locale, "flood.status_off")
    };

    bot.send_message(chat_id, status)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_tokens_disable() {
        assert_eq!(parse_setflood_arg("off"), Ok(FloodLimitArg::Off));
        assert_eq!(parse_setflood_arg("OFF"), Ok(FloodLimitArg::Off));
        assert_eq!(parse_setflood_arg("no"), Ok(FloodLimitArg::Off));
        assert_eq!(parse_setflood_arg("0"), Ok(FloodLimitArg::Off));
    }

    #[test]
    fn test_low_limits_rejected() {
        assert_eq!(parse_setflood_arg("1"), Err(SetFloodError::TooLow));
        assert_eq!(parse_setflood_arg("2"), Err(SetFloodError::TooLow));
    }

    #[test]
    fn test_valid_limits_accepted() {
        assert_eq!(parse_setflood_arg("3"), Ok(FloodLimitArg::Limit(3)));
        assert_eq!(parse_setflood_arg("25"), Ok(FloodLimitArg::Limit(25)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(parse_setflood_arg("many"), Err(SetFloodError::InvalidArgument));
        assert_eq!(parse_setflood_arg("-3"), Err(SetFloodError::InvalidArgument));
        assert_eq!(parse_setflood_arg("3.5"), Err(SetFloodError::InvalidArgument));
    }
}
