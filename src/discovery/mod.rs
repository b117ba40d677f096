//! Deduplicating feed poller
//!
//! Two stages joined by a bounded queue:
//!
//! - fetch: pull the upstream listing on a fixed interval, drop records
//!   without an address and addresses already logged or already queued
//! - record: enrich each queued batch with bounded concurrency, append to the
//!   TokenLog in feed order, then notify the dispatcher
//!
//! The record stage is the only writer to the TokenLog, and slow enrichment
//! never delays the next fetch. The TokenLog is the only "seen" index, so a
//! restart never replays tokens that were already logged. The pending set
//! only covers profiles between fetch and append.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::apis::TokenFeed;
use crate::config::Config;
use crate::enrichment::EnrichmentCoordinator;
use crate::errors::{NetworkError, ScoutError};
use crate::logger::{self, LogTag};
use crate::profiles::{EnrichedToken, TokenProfile};
use crate::shutdown::ShutdownSignal;
use crate::storage::Database;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub fetch_timeout: Duration,
    pub max_concurrent_enrichments: usize,
    pub max_queued_batches: usize,
}

impl PollerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.feed.poll_interval_secs),
            error_backoff: Duration::from_secs(config.feed.error_backoff_secs),
            fetch_timeout: Duration::from_secs(config.feed.request_timeout_secs),
            max_concurrent_enrichments: config.enrichment_concurrency(),
            max_queued_batches: config.enrichment.max_queued_batches.max(1),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Discovery statistics for tracking poller health
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryStats {
    /// Fetch cycles
    pub cycles: u64,
    pub failed_cycles: u64,
    pub consecutive_failures: u64,
    pub tokens_discovered: u64,
    pub malformed_skipped: u64,
    /// Batches whose append to the TokenLog failed
    pub persist_failures: u64,
    /// Fetched profiles deferred because the enrichment queue was full
    pub deferred: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Outcome of one cycle
///
/// `discovered` stays 0 when the fetch stage ran alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub malformed: usize,
    pub already_known: usize,
    pub discovered: usize,
}

pub struct FeedPoller {
    feed: Arc<dyn TokenFeed>,
    coordinator: Arc<EnrichmentCoordinator>,
    db: Arc<Database>,
    notifications: mpsc::Sender<EnrichedToken>,
    settings: PollerSettings,
    stats: Arc<RwLock<DiscoveryStats>>,
    /// Addresses fetched but not yet appended
    pending: Mutex<HashSet<String>>,
}

impl FeedPoller {
    pub fn new(
        feed: Arc<dyn TokenFeed>,
        coordinator: Arc<EnrichmentCoordinator>,
        db: Arc<Database>,
        notifications: mpsc::Sender<EnrichedToken>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            feed,
            coordinator,
            db,
            notifications,
            settings,
            stats: Arc::new(RwLock::new(DiscoveryStats::default())),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn stats(&self) -> DiscoveryStats {
        self.stats.read().clone()
    }

    /// Shared handle for health reporting
    pub fn stats_handle(&self) -> Arc<RwLock<DiscoveryStats>> {
        self.stats.clone()
    }

    /// Fetch stage: returns profiles that are neither logged nor pending,
    /// and marks them pending
    async fn fetch_new(&self) -> Result<(CycleReport, Vec<TokenProfile>), ScoutError> {
        let records = match tokio::time::timeout(
            self.settings.fetch_timeout,
            self.feed.fetch_latest(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(NetworkError::Timeout {
                    endpoint: self.feed.name().to_string(),
                    timeout_ms: self.settings.fetch_timeout.as_millis() as u64,
                }
                .into())
            }
        };

        let mut report = CycleReport {
            fetched: records.len(),
            ..Default::default()
        };

        let fresh = {
            let mut pending = self.pending.lock();
            let mut batch = HashSet::new();
            let mut fresh = Vec::new();
            for record in records {
                let Some(profile) = TokenProfile::from_raw(record) else {
                    report.malformed += 1;
                    continue;
                };
                let address = &profile.token_address;
                if pending.contains(address)
                    || batch.contains(address)
                    || self.db.contains_token(address)?
                {
                    report.already_known += 1;
                    continue;
                }
                batch.insert(address.clone());
                fresh.push(profile);
            }
            pending.extend(batch);
            fresh
        };

        if report.malformed > 0 {
            logger::debug(
                LogTag::Feed,
                &format!("Skipped {} record(s) without a token address", report.malformed),
            );
        }
        Ok((report, fresh))
    }

    fn release(&self, profiles: &[TokenProfile]) {
        let mut pending = self.pending.lock();
        for profile in profiles {
            pending.remove(&profile.token_address);
        }
    }

    /// Record stage: enrich, append in feed order, notify
    ///
    /// A persistence failure aborts the batch at that item. Every address in
    /// the batch leaves the pending set afterwards, so whatever was not logged
    /// is picked up again by the next fetch.
    async fn record(&self, profiles: Vec<TokenProfile>) -> Result<usize, ScoutError> {
        if profiles.is_empty() {
            return Ok(0);
        }
        let addresses: Vec<String> = profiles.iter().map(|p| p.token_address.clone()).collect();

        let result = self.enrich_and_append(profiles).await;

        let mut pending = self.pending.lock();
        for address in &addresses {
            pending.remove(address);
        }
        drop(pending);

        if let Err(e) = &result {
            let mut stats = self.stats.write();
            stats.persist_failures += 1;
            stats.last_error = Some(e.to_string());
        }
        result
    }

    async fn enrich_and_append(&self, profiles: Vec<TokenProfile>) -> Result<usize, ScoutError> {
        logger::debug(
            LogTag::Discovery,
            &format!("{} new profile(s) to enrich", profiles.len()),
        );

        // `buffered` keeps feed order while enriching several tokens at once
        let coordinator = &self.coordinator;
        let mut enriched = stream::iter(profiles)
            .map(|profile| coordinator.enrich(profile))
            .buffered(self.settings.max_concurrent_enrichments.max(1));

        let mut discovered = 0;
        while let Some(enrichment) = enriched.next().await {
            let address = enrichment.profile.token_address.clone();
            let token = match self.db.append_token(enrichment) {
                Ok(Some(token)) => token,
                Ok(None) => {
                    logger::debug(
                        LogTag::Discovery,
                        &format!("Token {} was logged meanwhile", address),
                    );
                    continue;
                }
                Err(e) => {
                    return Err(ScoutError::storage(format!(
                        "Failed to log token {}: {:#}",
                        address, e
                    )))
                }
            };
            discovered += 1;
            self.stats.write().tokens_discovered += 1;

            logger::info(
                LogTag::Discovery,
                &format!(
                    "New token #{} {} on {} (followers: {}, members: {})",
                    token.discovery_sequence,
                    token.token_address,
                    token.chain_id,
                    token.twitter_followers,
                    token.telegram_members
                ),
            );

            if self.notifications.send(token).await.is_err() {
                // Logged tokens above the watermark are caught up on restart
                logger::warning(
                    LogTag::Discovery,
                    "Dispatcher channel closed; token stays logged for catch-up",
                );
            }
        }

        Ok(discovered)
    }

    fn note_fetch(&self, outcome: Result<&CycleReport, &ScoutError>) {
        let mut stats = self.stats.write();
        stats.cycles += 1;
        match outcome {
            Ok(report) => {
                stats.consecutive_failures = 0;
                stats.malformed_skipped += report.malformed as u64;
                stats.last_success = Some(Utc::now());
            }
            Err(e) => {
                stats.failed_cycles += 1;
                stats.consecutive_failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }

    /// Fetch and record back to back, folding the outcome into the stats
    ///
    /// Used for single-shot runs; the long-running loop is [`FeedPoller::run`].
    pub async fn run_cycle(&self) -> Result<CycleReport, ScoutError> {
        let fetched = self.fetch_new().await;
        self.note_fetch(fetched.as_ref().map(|(report, _)| report));
        let (mut report, fresh) = fetched?;

        report.discovered = self.record(fresh).await?;
        Ok(report)
    }

    /// Poll until shutdown; failures back off, never terminate the loop
    ///
    /// Fetching runs here while a separate task records queued batches.
    pub async fn run(self: Arc<Self>, shutdown: ShutdownSignal) {
        logger::info(
            LogTag::Discovery,
            &format!(
                "Polling {} every {}s (backoff {}s, {} concurrent enrichments)",
                self.feed.name(),
                self.settings.poll_interval.as_secs(),
                self.settings.error_backoff.as_secs(),
                self.settings.max_concurrent_enrichments
            ),
        );

        let (batches, queued) = mpsc::channel(self.settings.max_queued_batches.max(1));
        let recorder = tokio::spawn(self.clone().record_batches(queued, shutdown.clone()));

        while !shutdown.is_triggered() {
            let fetched = tokio::select! {
                _ = shutdown.wait() => break,
                fetched = self.fetch_new() => fetched,
            };
            self.note_fetch(fetched.as_ref().map(|(report, _)| report));

            let delay = match fetched {
                Ok((report, fresh)) => {
                    if !fresh.is_empty() {
                        logger::debug(
                            LogTag::Discovery,
                            &format!(
                                "Cycle: {} fetched, {} queued for enrichment",
                                report.fetched,
                                fresh.len()
                            ),
                        );
                        self.enqueue(&batches, fresh);
                    }
                    self.settings.poll_interval
                }
                Err(e) => {
                    let message = format!(
                        "Fetch failed, retrying in {}s: {}",
                        self.settings.error_backoff.as_secs(),
                        e
                    );
                    if e.is_transient() {
                        logger::warning(LogTag::Feed, &message);
                    } else {
                        logger::error(LogTag::Discovery, &message);
                    }
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        drop(batches);
        if let Err(e) = recorder.await {
            logger::error(
                LogTag::Discovery,
                &format!("Record task ended abnormally: {}", e),
            );
        }
        logger::info(LogTag::Discovery, "Feed poller stopped");
    }

    /// Never waits: a full queue defers the batch to a later fetch
    fn enqueue(&self, batches: &mpsc::Sender<Vec<TokenProfile>>, fresh: Vec<TokenProfile>) {
        let rejected = match batches.try_send(fresh) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(fresh))
            | Err(mpsc::error::TrySendError::Closed(fresh)) => fresh,
        };
        self.release(&rejected);
        self.stats.write().deferred += rejected.len() as u64;
        logger::warning(
            LogTag::Discovery,
            &format!(
                "Enrichment queue full; {} profile(s) deferred to the next fetch",
                rejected.len()
            ),
        );
    }

    async fn record_batches(
        self: Arc<Self>,
        mut queued: mpsc::Receiver<Vec<TokenProfile>>,
        shutdown: ShutdownSignal,
    ) {
        loop {
            let batch = tokio::select! {
                _ = shutdown.wait() => break,
                batch = queued.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            // In-flight enrichment is abandoned on shutdown; nothing was logged yet
            let recorded = tokio::select! {
                _ = shutdown.wait() => break,
                recorded = self.record(batch) => recorded,
            };

            match recorded {
                Ok(0) => {}
                Ok(discovered) => logger::info(
                    LogTag::Discovery,
                    &format!(
                        "{} new token(s), {} total this session",
                        discovered,
                        self.stats().tokens_discovered
                    ),
                ),
                Err(e) => logger::error(
                    LogTag::Discovery,
                    &format!("Batch not fully logged, retried on the next fetch: {}", e),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::{RawLink, RawTokenProfile};
    use crate::social::{
        ProfileStats, TelegramResolver, TwitterProfile, TwitterProfileSource, TwitterResolver,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedFeed {
        responses: Mutex<VecDeque<Result<Vec<RawTokenProfile>, ScoutError>>>,
        delay: Duration,
        /// Served once the script runs out
        fallback: Vec<RawTokenProfile>,
        fetches: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<Vec<RawTokenProfile>, ScoutError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                delay: Duration::ZERO,
                fallback: Vec::new(),
                fetches: AtomicUsize::new(0),
            })
        }

        fn repeating(listing: Vec<RawTokenProfile>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::new()),
                delay: Duration::ZERO,
                fallback: listing,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenFeed for ScriptedFeed {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch_latest(&self) -> Result<Vec<RawTokenProfile>, ScoutError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    struct SlowTwitter {
        delay: Duration,
    }

    #[async_trait]
    impl TwitterProfileSource for SlowTwitter {
        async fn get_profile_info(
            &self,
            handle: &str,
        ) -> Result<Option<TwitterProfile>, ScoutError> {
            tokio::time::sleep(self.delay).await;
            Ok(Some(TwitterProfile {
                username: handle.to_string(),
                stats: ProfileStats {
                    followers: 42,
                    ..Default::default()
                },
            }))
        }
    }

    fn raw(address: Option<&str>, chain: &str) -> RawTokenProfile {
        RawTokenProfile {
            chain_id: Some(chain.to_string()),
            token_address: address.map(str::to_string),
            description: Some("desc".to_string()),
            links: Some(vec![RawLink {
                link_type: Some("website".to_string()),
                label: None,
                url: Some("https://w".to_string()),
            }]),
        }
    }

    fn raw_with_twitter(address: &str) -> RawTokenProfile {
        let mut record = raw(Some(address), "solana");
        record.links = Some(vec![RawLink {
            link_type: Some("twitter".to_string()),
            label: None,
            url: Some(format!("https://x.com/{}", address.to_lowercase())),
        }]);
        record
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(20),
            fetch_timeout: Duration::from_millis(200),
            max_concurrent_enrichments: 4,
            max_queued_batches: 4,
        }
    }

    fn poller_with(
        feed: Arc<dyn TokenFeed>,
        coordinator: EnrichmentCoordinator,
        db: Arc<Database>,
    ) -> (FeedPoller, mpsc::Receiver<EnrichedToken>) {
        let (tx, rx) = mpsc::channel(64);
        let poller = FeedPoller::new(feed, Arc::new(coordinator), db, tx, settings());
        (poller, rx)
    }

    fn poller(
        feed: Arc<dyn TokenFeed>,
        db: Arc<Database>,
    ) -> (FeedPoller, mpsc::Receiver<EnrichedToken>) {
        poller_with(feed, EnrichmentCoordinator::links_only(), db)
    }

    fn drain(rx: &mut mpsc::Receiver<EnrichedToken>) -> Vec<String> {
        let mut addresses = Vec::new();
        while let Ok(token) = rx.try_recv() {
            addresses.push(token.token_address);
        }
        addresses
    }

    #[tokio::test]
    async fn test_new_tokens_are_logged_once_in_feed_order() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = ScriptedFeed::new(vec![
            Ok(vec![raw(Some("A"), "Solana"), raw(Some("B"), "base"), raw(Some("A"), "solana")]),
            Ok(vec![raw(Some("B"), "base"), raw(Some("C"), "solana")]),
        ]);
        let (poller, mut rx) = poller(feed, db.clone());

        let first = poller.run_cycle().await.unwrap();
        assert_eq!(first.discovered, 2);
        assert_eq!(first.already_known, 1);

        let second = poller.run_cycle().await.unwrap();
        assert_eq!(second.discovered, 1);
        assert_eq!(second.already_known, 1);

        assert_eq!(drain(&mut rx), vec!["A", "B", "C"]);
        let logged = db.tokens_ordered().unwrap();
        assert_eq!(logged.len(), 3);
        assert_eq!(logged[0].chain_id, "solana");
        assert_eq!(logged[0].website_url.as_deref(), Some("https://w"));
        assert!(logged
            .windows(2)
            .all(|w| w[0].discovery_sequence < w[1].discovery_sequence));
        assert_eq!(poller.stats().tokens_discovered, 3);
    }

    #[tokio::test]
    async fn test_records_without_address_are_skipped() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = ScriptedFeed::new(vec![Ok(vec![
            raw(None, "solana"),
            raw(Some("  "), "solana"),
            raw(Some("A"), "solana"),
        ])]);
        let (poller, mut rx) = poller(feed, db);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.malformed, 2);
        assert_eq!(report.discovered, 1);
        assert_eq!(drain(&mut rx), vec!["A"]);
        assert_eq!(poller.stats().malformed_skipped, 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_and_recoverable() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = ScriptedFeed::new(vec![
            Err(NetworkError::HttpStatus {
                endpoint: "scripted".to_string(),
                status: 503,
                body: None,
            }
            .into()),
            Ok(vec![raw(Some("A"), "solana")]),
        ]);
        let (poller, _rx) = poller(feed, db);

        let err = poller.run_cycle().await.unwrap_err();
        assert!(err.is_transient());
        let stats = poller.stats();
        assert_eq!(stats.failed_cycles, 1);
        assert_eq!(stats.consecutive_failures, 1);

        assert_eq!(poller.run_cycle().await.unwrap().discovered, 1);
        assert_eq!(poller.stats().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_slow_feed_times_out() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = Arc::new(ScriptedFeed {
            responses: Mutex::new(VecDeque::new()),
            delay: Duration::from_secs(5),
            fallback: Vec::new(),
            fetches: AtomicUsize::new(0),
        });
        let (poller, _rx) = poller(feed, db);

        let err = poller.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            ScoutError::Network(NetworkError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_token_unseen_until_retried() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let listing = vec![raw(Some("A"), "solana")];
        let feed = ScriptedFeed::new(vec![Ok(listing.clone()), Ok(listing)]);
        let (poller, mut rx) = poller(feed, db.clone());

        db.execute_raw(
            "CREATE TRIGGER reject_tokens BEFORE INSERT ON tokens
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        let err = poller.run_cycle().await.unwrap_err();
        assert!(matches!(err, ScoutError::Storage(_)));
        assert!(!db.contains_token("A").unwrap());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(poller.stats().persist_failures, 1);

        db.execute_raw("DROP TRIGGER reject_tokens;").unwrap();

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.discovered, 1);
        assert!(db.contains_token("A").unwrap());
        assert_eq!(drain(&mut rx), vec!["A"]);
    }

    #[tokio::test]
    async fn test_restart_does_not_replay_logged_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");
        let listing = vec![raw(Some("A"), "solana"), raw(Some("B"), "solana")];

        {
            let db = Arc::new(Database::open(&path).unwrap());
            let (poller, mut rx) = poller(ScriptedFeed::new(vec![Ok(listing.clone())]), db);
            poller.run_cycle().await.unwrap();
            assert_eq!(drain(&mut rx).len(), 2);
        }

        let db = Arc::new(Database::open(&path).unwrap());
        let (poller, mut rx) = poller(ScriptedFeed::new(vec![Ok(listing)]), db.clone());
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.discovered, 0);
        assert_eq!(report.already_known, 2);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(db.token_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_channel_keeps_tokens_logged() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (poller, rx) = poller(
            ScriptedFeed::new(vec![Ok(vec![raw(Some("A"), "solana")])]),
            db.clone(),
        );
        drop(rx);

        assert_eq!(poller.run_cycle().await.unwrap().discovered, 1);
        assert!(db.contains_token("A").unwrap());
    }

    #[tokio::test]
    async fn test_slow_enrichment_does_not_delay_fetching() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let feed = ScriptedFeed::repeating(vec![raw_with_twitter("A"), raw_with_twitter("B")]);
        let coordinator = EnrichmentCoordinator::new(
            TwitterResolver::new(
                Arc::new(SlowTwitter {
                    delay: Duration::from_millis(400),
                }),
                Duration::from_secs(2),
            ),
            TelegramResolver::disabled(),
        );
        let (poller, mut rx) = poller_with(feed.clone(), coordinator, db.clone());
        let poller = Arc::new(poller);
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(poller.clone().run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        // Several fetches while the first batch is still being enriched
        assert!(feed.fetches.load(Ordering::SeqCst) >= 3);
        assert_eq!(db.token_count().unwrap(), 0);

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            (first.token_address.as_str(), second.token_address.as_str()),
            ("A", "B")
        );
        assert_eq!(first.twitter_followers, 42);

        // Pending profiles were not queued twice
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(db.token_count().unwrap(), 2);
        assert!(rx.try_recv().is_err());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_defers_profiles() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (poller, _rx) = poller(ScriptedFeed::new(vec![]), db);
        let (batches, _queued) = mpsc::channel(1);

        poller.pending.lock().insert("A".to_string());
        poller.enqueue(&batches, vec![]);
        let profile = TokenProfile::from_raw(raw(Some("A"), "solana")).unwrap();
        poller.enqueue(&batches, vec![profile]);

        assert!(!poller.pending.lock().contains("A"));
        assert_eq!(poller.stats().deferred, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (poller, mut rx) = poller(
            ScriptedFeed::new(vec![Ok(vec![raw(Some("A"), "solana")])]),
            db,
        );
        let poller = Arc::new(poller);
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(poller.clone().run(shutdown.clone()));

        let token = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(token.token_address, "A");

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(poller.stats().cycles >= 1);
    }
}
