//! Configuration schema: one `config_struct!` per section of config.toml

use crate::config_struct;

config_struct! {
    /// Upstream token-profile listing
    pub struct FeedConfig {
        /// Listing endpoint returning a JSON array of token profiles
        url: String = "https://api.dexscreener.com/token-profiles/latest/v1".to_string(),
        /// Sleep between successful cycles
        poll_interval_secs: u64 = 3,
        /// Sleep after a failed cycle (fetch or persistence failure)
        error_backoff_secs: u64 = 5,
        request_timeout_secs: u64 = 10,
        requests_per_minute: usize = 60,
    }
}

config_struct! {
    pub struct EnrichmentConfig {
        /// In-flight enrichments across distinct tokens within one cycle
        max_concurrent: usize = 4,
        /// Bound applied to every individual resolver call
        resolver_timeout_secs: u64 = 10,
        /// Fetched batches waiting for enrichment before new ones are deferred
        max_queued_batches: usize = 16,
    }
}

config_struct! {
    /// Twitter/X follower lookups through a Nitter instance
    pub struct TwitterConfig {
        enabled: bool = true,
        nitter_instance: String = "https://nitter.privacydev.net".to_string(),
        requests_per_minute: usize = 30,
    }
}

config_struct! {
    /// Telegram bot used for delivery, commands and member-count lookups
    pub struct TelegramConfig {
        enabled: bool = false,
        /// Bot token from @BotFather
        bot_token: String = String::new(),
        /// Look up member counts of linked Telegram channels/groups
        resolve_members: bool = true,
        requests_per_minute: usize = 20,
    }
}

config_struct! {
    pub struct DispatchConfig {
        /// Concurrent deliveries across distinct subscribers
        max_concurrent_deliveries: usize = 8,
        /// Poller -> dispatcher notification queue size
        channel_capacity: usize = 256,
        /// Print alerts to the console when no Telegram bot is configured
        console_subscriber: bool = true,
    }
}

config_struct! {
    pub struct StorageConfig {
        /// Empty means `<data dir>/tokenscout.db`
        database_path: String = String::new(),
    }
}

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        feed: FeedConfig = FeedConfig::default(),
        enrichment: EnrichmentConfig = EnrichmentConfig::default(),
        twitter: TwitterConfig = TwitterConfig::default(),
        telegram: TelegramConfig = TelegramConfig::default(),
        dispatch: DispatchConfig = DispatchConfig::default(),
        storage: StorageConfig = StorageConfig::default(),
    }
}

impl Config {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("feed.poll_interval_secs", self.feed.poll_interval_secs),
            ("feed.error_backoff_secs", self.feed.error_backoff_secs),
            ("feed.request_timeout_secs", self.feed.request_timeout_secs),
            ("enrichment.resolver_timeout_secs", self.enrichment.resolver_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(format!("{} must be greater than zero", field));
            }
        }

        if self.feed.url.trim().is_empty() {
            return Err("feed.url must not be empty".to_string());
        }
        if self.enrichment.max_queued_batches == 0 {
            return Err("enrichment.max_queued_batches must be greater than zero".to_string());
        }
        if self.dispatch.channel_capacity == 0 {
            return Err("dispatch.channel_capacity must be greater than zero".to_string());
        }
        if self.telegram.enabled && self.telegram.bot_token.trim().is_empty() {
            return Err("telegram.enabled requires telegram.bot_token".to_string());
        }

        Ok(())
    }

    /// Enrichment concurrency clamped to the supported 1..=8 range
    pub fn enrichment_concurrency(&self) -> usize {
        self.enrichment.max_concurrent.clamp(1, 8)
    }

    pub fn telegram_bot_enabled(&self) -> bool {
        self.telegram.enabled && !self.telegram.bot_token.trim().is_empty()
    }
}
