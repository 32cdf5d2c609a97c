//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod afk;
pub mod antiflood;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    // AFK commands
    #[command(description = "Set AFK status")]
    Afk,

    #[command(description = "Set AFK status (alias)")]
    Brb,

    // Antiflood commands
    #[command(description = "Set the flood limit")]
    Setflood,

    #[command(description = "Show the flood limit")]
    Flood,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        // AFK
        .branch(case![Command::Afk].endpoint(afk::afk_command))
        .branch(case![Command::Brb].endpoint(afk::brb_command))
        // Antiflood
        .branch(case![Command::Setflood].endpoint(antiflood::setflood_command))
        .branch(case![Command::Flood].endpoint(antiflood::flood_command))
}
