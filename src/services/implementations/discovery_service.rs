use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::discovery::{DiscoveryStats, FeedPoller};
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use crate::shutdown::ShutdownSignal;

/// Failed cycles in a row before the poller is reported degraded
const DEGRADED_AFTER_FAILURES: u64 = 3;

/// Poller health derived from its counters
pub fn discovery_health(stats: &DiscoveryStats) -> ServiceHealth {
    if stats.consecutive_failures >= DEGRADED_AFTER_FAILURES {
        return ServiceHealth::Degraded(format!(
            "{} consecutive failed cycles: {}",
            stats.consecutive_failures,
            stats.last_error.as_deref().unwrap_or("unknown error")
        ));
    }
    if stats.cycles == 0 {
        return ServiceHealth::Starting;
    }
    ServiceHealth::Healthy
}

pub struct DiscoveryService {
    poller: Arc<FeedPoller>,
}

impl DiscoveryService {
    pub fn new(poller: Arc<FeedPoller>) -> Self {
        Self { poller }
    }
}

#[async_trait]
impl Service for DiscoveryService {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["dispatcher"]
    }

    async fn start(&mut self, shutdown: ShutdownSignal) -> Result<Vec<JoinHandle<()>>, String> {
        logger::debug(LogTag::Discovery, "Starting feed poller task");
        Ok(vec![tokio::spawn(self.poller.clone().run(shutdown))])
    }

    async fn stop(&mut self) -> Result<(), String> {
        let stats = self.poller.stats();
        logger::info(
            LogTag::Discovery,
            &format!(
                "Session totals: {} cycles ({} failed), {} tokens discovered, {} malformed records, {} failed appends, {} deferred",
                stats.cycles,
                stats.failed_cycles,
                stats.tokens_discovered,
                stats.malformed_skipped,
                stats.persist_failures,
                stats.deferred
            ),
        );
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        discovery_health(&self.poller.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_after_repeated_failures() {
        let mut stats = DiscoveryStats::default();
        assert_eq!(discovery_health(&stats), ServiceHealth::Starting);

        stats.cycles = 4;
        stats.consecutive_failures = 2;
        assert_eq!(discovery_health(&stats), ServiceHealth::Healthy);

        stats.consecutive_failures = 3;
        stats.last_error = Some("feed timed out".to_string());
        assert_eq!(
            discovery_health(&stats).to_string(),
            "degraded (3 consecutive failed cycles: feed timed out)"
        );
    }
}
