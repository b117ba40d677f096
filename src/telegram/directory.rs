//! Bot API backed Telegram directory for member-count lookups
//!
//! `getChat("@username")` identifies the entity kind; member counts come
//! from `getChatMemberCount`. For plain groups the count is read alongside
//! the entity, channels and supergroups get it from the full lookup.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Recipient};
use teloxide::{ApiError, RequestError};

use crate::apis::RateLimiter;
use crate::errors::{NetworkError, ScoutError};
use crate::logger::{self, LogTag};
use crate::social::{FullChannel, TelegramDirectory, TelegramEntity};

pub struct BotDirectory {
    bot: Bot,
    limiter: RateLimiter,
}

impl BotDirectory {
    pub fn new(bot: Bot, requests_per_minute: usize) -> Self {
        Self {
            bot,
            limiter: RateLimiter::new(requests_per_minute),
        }
    }

    async fn member_count(&self, chat_id: i64) -> Result<Option<u64>, ScoutError> {
        let _permit = self.limiter.acquire().await?;
        match self.bot.get_chat_member_count(ChatId(chat_id)).await {
            Ok(count) => Ok(Some(u64::from(count))),
            Err(RequestError::Api(ApiError::ChatNotFound)) => Ok(None),
            Err(e) => Err(request_error("getChatMemberCount", e)),
        }
    }
}

fn request_error(method: &str, err: RequestError) -> ScoutError {
    match err {
        RequestError::RetryAfter(wait) => NetworkError::RateLimiter(format!(
            "{} throttled, retry after {:?}",
            method, wait
        ))
        .into(),
        other => NetworkError::Request {
            endpoint: method.to_string(),
            message: other.to_string(),
        }
        .into(),
    }
}

#[async_trait]
impl TelegramDirectory for BotDirectory {
    async fn get_entity(&self, username: &str) -> Result<TelegramEntity, ScoutError> {
        let chat = {
            let _permit = self.limiter.acquire().await?;
            match self
                .bot
                .get_chat(Recipient::ChannelUsername(format!("@{}", username)))
                .await
            {
                Ok(chat) => chat,
                Err(RequestError::Api(ApiError::ChatNotFound)) => {
                    return Ok(TelegramEntity::NotFound)
                }
                Err(e) => return Err(request_error("getChat", e)),
            }
        };

        let id = chat.id.0;
        let entity = if chat.is_channel() {
            TelegramEntity::BroadcastChannel { id }
        } else if chat.is_supergroup() {
            TelegramEntity::Megagroup { id }
        } else if chat.is_group() {
            TelegramEntity::Group {
                id,
                participants_count: self.member_count(id).await?,
            }
        } else {
            TelegramEntity::User
        };

        logger::verbose(
            LogTag::Telegram,
            &format!("@{} resolved to {:?}", username, entity),
        );
        Ok(entity)
    }

    async fn get_full_channel(&self, entity: &TelegramEntity) -> Result<FullChannel, ScoutError> {
        let (TelegramEntity::BroadcastChannel { id } | TelegramEntity::Megagroup { id }) = entity
        else {
            return Ok(FullChannel::default());
        };

        Ok(FullChannel {
            participants_count: self.member_count(*id).await?,
        })
    }
}
