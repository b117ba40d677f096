use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;
use crate::logger::{self, LogTag};
use crate::profiles::EnrichedToken;
use crate::services::{Service, ServiceHealth};
use crate::shutdown::ShutdownSignal;

/// Consumes poller notifications; runs the startup catch-up first
pub struct DispatcherService {
    dispatcher: Arc<Dispatcher>,
    notifications: Option<mpsc::Receiver<EnrichedToken>>,
    handle: Option<tokio::task::AbortHandle>,
}

impl DispatcherService {
    pub fn new(dispatcher: Arc<Dispatcher>, notifications: mpsc::Receiver<EnrichedToken>) -> Self {
        Self {
            dispatcher,
            notifications: Some(notifications),
            handle: None,
        }
    }
}

#[async_trait]
impl Service for DispatcherService {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn start(&mut self, shutdown: ShutdownSignal) -> Result<Vec<JoinHandle<()>>, String> {
        let notifications = self
            .notifications
            .take()
            .ok_or_else(|| "Dispatcher already started".to_string())?;

        let handle = tokio::spawn(self.dispatcher.clone().run(notifications, shutdown));
        self.handle = Some(handle.abort_handle());

        logger::debug(LogTag::Dispatch, "Dispatcher task spawned");
        Ok(vec![handle])
    }

    async fn health(&self) -> ServiceHealth {
        match &self.handle {
            None => ServiceHealth::Starting,
            Some(handle) if handle.is_finished() => {
                ServiceHealth::Unhealthy("Dispatcher task exited".to_string())
            }
            Some(_) => ServiceHealth::Healthy,
        }
    }
}
