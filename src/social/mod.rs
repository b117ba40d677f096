//! Social metric resolvers
//!
//! Each resolver maps a profile URL to a best-effort popularity metric
//! (Twitter/X followers, Telegram members). Resolvers never fail: malformed
//! URLs, missing or private entities, upstream errors and timeouts all
//! resolve to `0` and are logged.

pub mod telegram;
pub mod twitter;

pub use telegram::{
    parse_telegram_username, FullChannel, TelegramDirectory, TelegramEntity, TelegramResolver,
};
pub use twitter::{
    parse_twitter_handle, ProfileStats, TwitterProfile, TwitterProfileSource, TwitterResolver,
};

use std::time::Duration;

/// Default bound for one resolver call
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(10);
