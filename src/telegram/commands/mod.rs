//! Chat command glue
//!
//! Parses `/command args` text and maps it onto registry and dispatcher
//! operations. Replies are Telegram HTML.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::discovery::DiscoveryStats;
use crate::dispatch::{html_escape, Dispatcher};
use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::services::implementations::discovery_health;
use crate::subscriptions::{SubscriberId, SubscriptionRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// `None` lists known chains; `all`/`any` clears the chain filter
    Chain(Option<String>),
    Followers(Option<String>),
    Clear,
    Show,
    Stop,
    Status,
    Help,
}

impl Command {
    /// Commands that may deliver many alerts before replying
    pub fn runs_in_background(&self) -> bool {
        matches!(self, Command::Show)
    }
}

/// Parse a chat message; `None` if it is not a known command
///
/// Accepts the `/command@botname` form used in group chats.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    let arg = (!args.is_empty()).then(|| args.to_string());

    match name.as_str() {
        "start" => Some(Command::Start),
        "chain" => Some(Command::Chain(arg)),
        "followers" => Some(Command::Followers(arg)),
        "clear" => Some(Command::Clear),
        "show" => Some(Command::Show),
        "stop" => Some(Command::Stop),
        "status" => Some(Command::Status),
        "help" => Some(Command::Help),
        _ => None,
    }
}

pub const HELP_TEXT: &str = "<b>Commands</b>\n\n\
    /start - subscribe to new token alerts\n\
    /chain [id|all] - filter by chain (no argument lists chains)\n\
    /followers N - minimum Twitter followers\n\
    /clear - reset filters and allow history to be sent again\n\
    /show - send logged tokens matching your filters\n\
    /status - show your filters\n\
    /stop - unsubscribe";

const NOT_SUBSCRIBED: &str = "You are not subscribed. Send /start first.";

pub struct CommandContext {
    pub registry: Arc<SubscriptionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub discovery_stats: Option<Arc<RwLock<DiscoveryStats>>>,
}

impl CommandContext {
    /// Run a command for `chat` and produce the reply
    pub async fn execute(&self, chat: SubscriberId, command: Command) -> String {
        match self.run(chat, command).await {
            Ok(reply) => reply,
            Err(ScoutError::UnknownSubscriber(_)) => NOT_SUBSCRIBED.to_string(),
            Err(e) => {
                logger::error(
                    LogTag::Telegram,
                    &format!("Command for chat {} failed: {}", chat, e),
                );
                "Something went wrong, please try again later.".to_string()
            }
        }
    }

    async fn run(&self, chat: SubscriberId, command: Command) -> Result<String, ScoutError> {
        match command {
            Command::Start => {
                let subscriber = self.registry.create_subscriber(chat)?;
                Ok(format!(
                    "Monitoring started! You will receive new token alerts here.\n\
                     Current filter: {}\n\
                     Use /chain to filter by chain, /followers to set a minimum follower count.",
                    html_escape(&subscriber.filter.to_string())
                ))
            }
            Command::Help => Ok(HELP_TEXT.to_string()),
            Command::Chain(None) => {
                // Validates the subscription before listing
                self.registry.get(chat)?;
                let chains = self.registry.database().known_chains()?;
                if chains.is_empty() {
                    return Ok("No chains seen yet, please try again later.".to_string());
                }
                let listed: Vec<String> = chains.iter().map(|c| c.to_uppercase()).collect();
                Ok(format!(
                    "Available chains: {}\nUse /chain &lt;id&gt; or /chain all.",
                    html_escape(&listed.join(", "))
                ))
            }
            Command::Chain(Some(chain)) => {
                let chain = match chain.to_lowercase().as_str() {
                    "all" | "any" => None,
                    _ => Some(chain),
                };
                let filter = self.registry.set_chain_filter(chat, chain.as_deref())?;
                Ok(format!(
                    "Filter updated: {}",
                    html_escape(&filter.to_string())
                ))
            }
            Command::Followers(arg) => {
                let Some(min_followers) = arg.and_then(|a| a.replace(',', "").parse::<u64>().ok())
                else {
                    return Ok("Usage: /followers N (a whole number, 0 disables)".to_string());
                };
                let filter = self.registry.set_min_followers(chat, min_followers)?;
                Ok(format!(
                    "Filter updated: {}",
                    html_escape(&filter.to_string())
                ))
            }
            Command::Clear => {
                self.registry.clear_filters(chat)?;
                Ok("Filters cleared. Use /show to receive every logged token again.".to_string())
            }
            Command::Show => {
                let report = self.dispatcher.replay(chat).await?;
                if report.attempted() == 0 {
                    Ok("No new tokens match your filters.".to_string())
                } else {
                    Ok(format!("Sent {} token(s) matching your filters.", report.attempted()))
                }
            }
            Command::Stop => {
                self.registry.remove_subscriber(chat)?;
                self.dispatcher.close_session(chat);
                Ok("Unsubscribed. Send /start to subscribe again.".to_string())
            }
            Command::Status => {
                let subscriber = self.registry.get(chat)?;
                let delivered = self.registry.database().delivery_count(chat.0)?;
                let logged = self.registry.database().token_count()?;
                let mut reply = format!(
                    "<b>Status</b>\n\n\
                     • Filter: {}\n\
                     • Tokens sent to you: {}\n\
                     • Tokens logged: {}",
                    html_escape(&subscriber.filter.to_string()),
                    delivered,
                    logged
                );
                if let Some(stats) = &self.discovery_stats {
                    let stats = stats.read().clone();
                    reply.push_str(&format!(
                        "\n• Poll cycles: {} ({} failed)\n• Discovery: {}",
                        stats.cycles,
                        stats.failed_cycles,
                        html_escape(&discovery_health(&stats).to_string())
                    ));
                }
                Ok(reply)
            }
        }
    }
}
