//! Delivery sinks

use async_trait::async_trait;

use super::format::{format_console_alert, format_token_alert};
use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::profiles::EnrichedToken;
use crate::subscriptions::SubscriberId;

/// External delivery collaborator
#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn name(&self) -> &str;

    /// Render a token for this sink's medium
    fn render(&self, token: &EnrichedToken) -> String {
        format_token_alert(token)
    }

    async fn deliver(&self, subscriber: SubscriberId, message: &str) -> Result<(), ScoutError>;
}

/// Prints alerts through the logger
pub struct ConsoleSink;

#[async_trait]
impl DeliverySink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn render(&self, token: &EnrichedToken) -> String {
        format_console_alert(token)
    }

    async fn deliver(&self, _subscriber: SubscriberId, message: &str) -> Result<(), ScoutError> {
        logger::info(LogTag::Dispatch, &format!("\n{}", message));
        Ok(())
    }
}
