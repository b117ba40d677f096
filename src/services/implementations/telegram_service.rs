use async_trait::async_trait;
use std::sync::Arc;
use teloxide::Bot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use crate::shutdown::ShutdownSignal;
use crate::telegram::{self, CommandContext};

/// Chat command handling; only runs when a bot token is configured
pub struct TelegramService {
    bot: Bot,
    commands: Arc<CommandContext>,
    username: Option<String>,
}

impl TelegramService {
    pub fn new(bot: Bot, commands: Arc<CommandContext>) -> Self {
        Self {
            bot,
            commands,
            username: None,
        }
    }
}

#[async_trait]
impl Service for TelegramService {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["dispatcher"]
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.telegram_bot_enabled()
    }

    async fn initialize(&mut self) -> Result<(), String> {
        self.username = Some(telegram::validate_bot(&self.bot).await?);
        Ok(())
    }

    async fn start(&mut self, shutdown: ShutdownSignal) -> Result<Vec<JoinHandle<()>>, String> {
        let handle = tokio::spawn(telegram::run_command_loop(
            self.bot.clone(),
            self.commands.clone(),
            shutdown,
        ));
        Ok(vec![handle])
    }

    async fn stop(&mut self) -> Result<(), String> {
        logger::info(LogTag::Telegram, "Telegram service stopped");
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        match &self.username {
            Some(_) => ServiceHealth::Healthy,
            None => ServiceHealth::Unhealthy("Bot not validated".to_string()),
        }
    }
}
