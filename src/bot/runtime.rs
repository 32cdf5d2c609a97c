//! Bot runtime - long-polling runner.

use teloxide::prelude::*;
use tracing::info;

use super::dispatcher::ThrottledBot;

/// Run the bot with long polling until shut down.
pub async fn run(
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>,
) {
    info!("Starting bot in polling mode...");
    dispatcher.dispatch().await;
}
