//! Composition root: builds the pipeline from config and drives its lifecycle

use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::apis::{build_http_client, DexScreenerClient, NitterClient};
use crate::config::{self, Config};
use crate::discovery::{FeedPoller, PollerSettings};
use crate::dispatch::{ConsoleSink, DeliverySink, Dispatcher};
use crate::enrichment::EnrichmentCoordinator;
use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::profiles::EnrichedToken;
use crate::services::implementations::{
    discovery_health, DiscoveryService, DispatcherService, TelegramService,
};
use crate::services::ServiceManager;
use crate::shutdown::ShutdownSignal;
use crate::social::{TelegramResolver, TwitterResolver};
use crate::storage::Database;
use crate::subscriptions::{SubscriberId, SubscriptionRegistry};
use crate::telegram::{BotDirectory, CommandContext, TelegramSink};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Every long-lived component, wired but not yet running
pub struct Pipeline {
    pub db: Arc<Database>,
    pub registry: Arc<SubscriptionRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub poller: Arc<FeedPoller>,
    pub notifications: mpsc::Receiver<EnrichedToken>,
    pub bot: Option<Bot>,
}

fn build_resolvers(
    config: &Config,
    http: &reqwest::Client,
    bot: Option<&Bot>,
) -> Result<(TwitterResolver, TelegramResolver), ScoutError> {
    let timeout = Duration::from_secs(config.enrichment.resolver_timeout_secs);

    let twitter = if config.twitter.enabled {
        let nitter = NitterClient::new(
            http.clone(),
            &config.twitter.nitter_instance,
            timeout,
            config.twitter.requests_per_minute,
            config.enrichment_concurrency(),
        )?;
        TwitterResolver::new(Arc::new(nitter), timeout)
    } else {
        logger::info(LogTag::Twitter, "Twitter lookups disabled, followers default to 0");
        TwitterResolver::disabled()
    };

    let telegram = match bot {
        Some(bot) if config.telegram.resolve_members => TelegramResolver::new(
            Arc::new(BotDirectory::new(
                bot.clone(),
                config.telegram.requests_per_minute,
            )),
            timeout,
        ),
        _ => {
            logger::info(
                LogTag::Telegram,
                "Telegram member lookups disabled, members default to 0",
            );
            TelegramResolver::disabled()
        }
    };

    Ok((twitter, telegram))
}

/// Keep the console subscriber in step with the configured delivery target
fn sync_console_subscriber(
    registry: &SubscriptionRegistry,
    wanted: bool,
) -> Result<(), ScoutError> {
    if wanted {
        registry.create_subscriber(SubscriberId::CONSOLE)?;
        return Ok(());
    }
    match registry.remove_subscriber(SubscriberId::CONSOLE) {
        Ok(()) | Err(ScoutError::UnknownSubscriber(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn build_pipeline(config: &Config) -> Result<Pipeline, String> {
    let db_path = config::database_path();
    let db = Arc::new(
        Database::open(&db_path).map_err(|e| format!("Failed to open database: {:#}", e))?,
    );

    let fetch_timeout = Duration::from_secs(config.feed.request_timeout_secs);
    let http = build_http_client(fetch_timeout).map_err(|e| e.to_string())?;
    let feed = DexScreenerClient::new(
        http.clone(),
        &config.feed.url,
        fetch_timeout,
        config.feed.requests_per_minute,
    )
    .map_err(|e| e.to_string())?;

    let bot = config
        .telegram_bot_enabled()
        .then(|| Bot::new(config.telegram.bot_token.trim()));

    let (twitter, telegram) =
        build_resolvers(config, &http, bot.as_ref()).map_err(|e| e.to_string())?;
    let coordinator = Arc::new(EnrichmentCoordinator::new(twitter, telegram));

    let registry = Arc::new(SubscriptionRegistry::new(db.clone()));
    let console_wanted = bot.is_none() && config.dispatch.console_subscriber;
    sync_console_subscriber(&registry, console_wanted).map_err(|e| e.to_string())?;

    let sink: Arc<dyn DeliverySink> = match &bot {
        Some(bot) => Arc::new(TelegramSink::new(
            bot.clone(),
            config.dispatch.max_concurrent_deliveries,
        )),
        None => {
            if !console_wanted {
                logger::warning(
                    LogTag::Dispatch,
                    "No delivery target configured; tokens will only be logged",
                );
            }
            Arc::new(ConsoleSink)
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        sink,
        config.dispatch.max_concurrent_deliveries,
    ));

    let (tx, notifications) = mpsc::channel(config.dispatch.channel_capacity);
    let poller = Arc::new(FeedPoller::new(
        Arc::new(feed),
        coordinator,
        db.clone(),
        tx,
        PollerSettings::from_config(config),
    ));

    Ok(Pipeline {
        db,
        registry,
        dispatcher,
        poller,
        notifications,
        bot,
    })
}

/// Run every service until `shutdown` triggers
pub async fn run(shutdown: ShutdownSignal) -> Result<(), String> {
    let config = config::get_config_clone();
    let pipeline = build_pipeline(&config)?;

    logger::info(
        LogTag::System,
        &format!(
            "Pipeline ready: {} tokens logged, {} subscriber(s), delivery via {}",
            pipeline.db.token_count().map_err(|e| e.to_string())?,
            pipeline
                .registry
                .active_subscribers()
                .map_err(|e| e.to_string())?
                .len(),
            if pipeline.bot.is_some() { "telegram" } else { "console" }
        ),
    );

    let mut manager = ServiceManager::new(config, shutdown.clone());
    manager.register(Box::new(DispatcherService::new(
        pipeline.dispatcher.clone(),
        pipeline.notifications,
    )));
    manager.register(Box::new(DiscoveryService::new(pipeline.poller.clone())));
    if let Some(bot) = pipeline.bot {
        let commands = Arc::new(CommandContext {
            registry: pipeline.registry.clone(),
            dispatcher: pipeline.dispatcher.clone(),
            discovery_stats: Some(pipeline.poller.stats_handle()),
        });
        manager.register(Box::new(TelegramService::new(bot, commands)));
    }

    if let Err(e) = manager.start_all().await {
        logger::error(LogTag::System, &format!("Startup failed: {}", e));
        manager.stop_all().await?;
        return Err(e);
    }

    let mut health_checks = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    health_checks.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = health_checks.tick() => log_unhealthy(&manager).await,
        }
    }
    manager.stop_all().await
}

async fn log_unhealthy(manager: &ServiceManager) {
    let mut report: Vec<_> = manager
        .get_health()
        .await
        .into_iter()
        .filter(|(_, health)| !health.is_healthy())
        .collect();
    report.sort_by_key(|(name, _)| *name);
    for (name, health) in report {
        logger::warning(LogTag::System, &format!("Service {} is {}", name, health));
    }
}

/// Wait for a dispatcher task; a panic or cancellation is logged, not lost
async fn await_dispatcher(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            logger::error(LogTag::Dispatch, &format!("Dispatcher task failed: {}", e));
            false
        }
    }
}

/// One poll cycle with live dispatch, then exit
pub async fn run_single_cycle() -> Result<(), String> {
    let config = config::get_config_clone();
    let pipeline = build_pipeline(&config)?;

    let dispatch = tokio::spawn(
        pipeline
            .dispatcher
            .clone()
            .run(pipeline.notifications, ShutdownSignal::new()),
    );

    let stats = pipeline.poller.stats_handle();
    let result = pipeline.poller.run_cycle().await;
    // Dropping the poller closes the channel so the dispatcher drains and exits
    drop(pipeline.poller);
    await_dispatcher(dispatch).await;

    let health = discovery_health(&stats.read());
    let report = result.map_err(|e| e.to_string())?;
    logger::info(
        LogTag::Discovery,
        &format!(
            "Single cycle: {} fetched, {} new, {} already known, {} malformed; discovery {}",
            report.fetched, report.discovered, report.already_known, report.malformed, health
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_await_dispatcher_reports_panicked_task() {
        assert!(await_dispatcher(tokio::spawn(async {})).await);

        let panicked = tokio::spawn(async { panic!("dispatcher crashed") });
        assert!(!await_dispatcher(panicked).await);
    }

    #[test]
    fn test_console_subscriber_follows_config() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = SubscriptionRegistry::new(db);

        sync_console_subscriber(&registry, true).unwrap();
        assert!(registry.get(SubscriberId::CONSOLE).is_ok());

        sync_console_subscriber(&registry, false).unwrap();
        sync_console_subscriber(&registry, false).unwrap();
        assert!(registry.active_subscribers().unwrap().is_empty());
    }
}
