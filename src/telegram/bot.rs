//! Bot validation and command polling
//!
//! Commands arrive through long-polled `getUpdates`; the offset advances past
//! every received update so nothing is processed twice.

use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode, UpdateKind};

use super::commands::{parse_command, Command, CommandContext};
use crate::logger::{self, LogTag};
use crate::shutdown::ShutdownSignal;
use crate::subscriptions::SubscriberId;

const LONG_POLL_SECS: u32 = 10;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Validate the token by calling getMe; returns the bot's username
pub async fn validate_bot(bot: &Bot) -> Result<String, String> {
    match bot.get_me().await {
        Ok(me) => {
            let username = me.username.clone().unwrap_or_else(|| "unknown".to_string());
            logger::info(
                LogTag::Telegram,
                &format!("Bot initialized: @{} (ID: {})", username, me.id),
            );
            Ok(username)
        }
        Err(e) => {
            logger::error(
                LogTag::Telegram,
                &format!("Failed to validate bot token: {}", e),
            );
            Err(format!("Invalid bot token: {}", e))
        }
    }
}

/// Answer chat commands until shutdown
pub async fn run_command_loop(bot: Bot, ctx: Arc<CommandContext>, shutdown: ShutdownSignal) {
    logger::info(LogTag::Telegram, "Command polling started");
    let mut offset: i32 = 0;

    loop {
        let mut request = bot.get_updates().timeout(LONG_POLL_SECS);
        if offset > 0 {
            request = request.offset(offset);
        }

        let result = tokio::select! {
            _ = shutdown.wait() => break,
            result = request.send() => result,
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => {
                logger::warning(
                    LogTag::Telegram,
                    &format!("getUpdates failed: {}", e),
                );
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = update.id + 1;

            let UpdateKind::Message(message) = update.kind else {
                continue;
            };
            let Some(command) = message.text().and_then(parse_command) else {
                continue;
            };

            logger::debug(
                LogTag::Telegram,
                &format!("Chat {} sent {:?}", message.chat.id.0, command),
            );

            // Replays can take a while; other chats keep being answered meanwhile
            if command.runs_in_background() {
                tokio::spawn(answer(bot.clone(), ctx.clone(), message.chat.id, command));
            } else {
                answer(bot.clone(), ctx.clone(), message.chat.id, command).await;
            }
        }
    }

    logger::info(LogTag::Telegram, "Command polling stopped");
}

async fn answer(bot: Bot, ctx: Arc<CommandContext>, chat_id: ChatId, command: Command) {
    let reply = ctx.execute(SubscriberId(chat_id.0), command).await;
    if let Err(e) = bot
        .send_message(chat_id, reply)
        .parse_mode(ParseMode::Html)
        .await
    {
        logger::warning(
            LogTag::Telegram,
            &format!("Failed to reply to chat {}: {}", chat_id.0, e),
        );
    }
}
