//! Telegram delivery sink
//!
//! Subscriber ids are Telegram chat ids; alerts go out in HTML parse mode.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::apis::RateLimiter;
use crate::dispatch::DeliverySink;
use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::subscriptions::SubscriberId;

/// Telegram's global bot limit is ~30 messages per second
const MESSAGES_PER_MINUTE: usize = 1500;

pub struct TelegramSink {
    bot: Bot,
    limiter: RateLimiter,
}

impl TelegramSink {
    /// `max_in_flight` matches the dispatcher's delivery concurrency
    pub fn new(bot: Bot, max_in_flight: usize) -> Self {
        Self {
            bot,
            limiter: RateLimiter::with_concurrency(MESSAGES_PER_MINUTE, max_in_flight.max(1)),
        }
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, subscriber: SubscriberId, message: &str) -> Result<(), ScoutError> {
        let _permit = self.limiter.acquire().await?;

        self.bot
            .send_message(ChatId(subscriber.0), message)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
            .map_err(|e| {
                ScoutError::Delivery(format!("Failed to send Telegram message: {}", e))
            })?;

        logger::debug(
            LogTag::Telegram,
            &format!(
                "Sent alert to chat {} (length={})",
                subscriber,
                message.len()
            ),
        );
        Ok(())
    }
}
