mod health;
pub mod implementations;

pub use health::ServiceHealth;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::shutdown::ShutdownSignal;

const STOP_WAIT: Duration = Duration::from_secs(5);

/// Core service trait that all services must implement
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique service identifier
    fn name(&self) -> &'static str;

    /// Service priority (lower = starts earlier, stops later)
    fn priority(&self) -> i32 {
        100
    }

    /// Services this service depends on
    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }

    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Spawn the service's tasks; they must exit once `shutdown` triggers
    async fn start(&mut self, shutdown: ShutdownSignal) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}

pub struct ServiceManager {
    services: HashMap<&'static str, Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    shutdown: ShutdownSignal,
    config: Config,
}

impl ServiceManager {
    pub fn new(config: Config, shutdown: ShutdownSignal) -> Self {
        Self {
            services: HashMap::new(),
            handles: HashMap::new(),
            shutdown,
            config,
        }
    }

    /// Register a service
    pub fn register(&mut self, service: Box<dyn Service>) {
        let name = service.name();
        self.services.insert(name, service);
    }

    /// Start all enabled services in dependency and priority order
    pub async fn start_all(&mut self) -> Result<(), String> {
        let enabled_services: Vec<&'static str> = self
            .services
            .iter()
            .filter(|(_, service)| service.is_enabled(&self.config))
            .map(|(name, _)| *name)
            .collect();

        let ordered = self.resolve_startup_order(&enabled_services)?;
        logger::info(
            LogTag::System,
            &format!("Service startup order: {:?}", ordered),
        );

        for service_name in ordered {
            if let Some(service) = self.services.get_mut(service_name) {
                logger::debug(
                    LogTag::System,
                    &format!("Initializing service: {}", service_name),
                );
                service.initialize().await?;

                let handles = service.start(self.shutdown.clone()).await?;
                self.handles.insert(service_name, handles);

                logger::info(
                    LogTag::System,
                    &format!("Service started: {}", service_name),
                );
            }
        }

        Ok(())
    }

    /// Stop all services in reverse startup order
    pub async fn stop_all(&mut self) -> Result<(), String> {
        logger::info(LogTag::System, "Stopping all services...");

        self.shutdown.trigger();

        let running_services: Vec<&'static str> = self.handles.keys().copied().collect();
        let mut ordered = self.resolve_startup_order(&running_services)?;
        ordered.reverse();

        for service_name in ordered {
            if let Some(service) = self.services.get_mut(service_name) {
                if let Err(e) = service.stop().await {
                    logger::warning(
                        LogTag::System,
                        &format!("Service stop error for {}: {}", service_name, e),
                    );
                }

                if let Some(handles) = self.handles.remove(service_name) {
                    for handle in handles {
                        if tokio::time::timeout(STOP_WAIT, handle).await.is_err() {
                            logger::warning(
                                LogTag::System,
                                &format!(
                                    "Service {} did not stop within {}s",
                                    service_name,
                                    STOP_WAIT.as_secs()
                                ),
                            );
                        }
                    }
                }

                logger::info(
                    LogTag::System,
                    &format!("Service stopped: {}", service_name),
                );
            }
        }

        Ok(())
    }

    fn resolve_startup_order(
        &self,
        services: &[&'static str],
    ) -> Result<Vec<&'static str>, String> {
        use std::collections::HashSet;

        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        fn visit(
            name: &'static str,
            services: &HashMap<&'static str, Box<dyn Service>>,
            ordered: &mut Vec<&'static str>,
            visited: &mut HashSet<&'static str>,
            visiting: &mut HashSet<&'static str>,
        ) -> Result<(), String> {
            if visited.contains(name) {
                return Ok(());
            }

            if visiting.contains(name) {
                return Err(format!("Circular dependency detected for service: {}", name));
            }

            visiting.insert(name);

            if let Some(service) = services.get(name) {
                for dep in service.dependencies() {
                    visit(dep, services, ordered, visited, visiting)?;
                }
            }

            visiting.remove(name);
            visited.insert(name);
            ordered.push(name);

            Ok(())
        }

        for &service_name in services {
            visit(
                service_name,
                &self.services,
                &mut ordered,
                &mut visited,
                &mut visiting,
            )?;
        }

        // Stable sort keeps dependency order among equal priorities
        ordered.sort_by_key(|name| {
            self.services
                .get(name)
                .map(|s| s.priority())
                .unwrap_or(100)
        });

        Ok(ordered)
    }

    pub async fn get_health(&self) -> HashMap<&'static str, ServiceHealth> {
        let mut health = HashMap::new();
        for (name, service) in &self.services {
            health.insert(*name, service.health().await);
        }
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingService {
        name: &'static str,
        priority: i32,
        dependencies: Vec<&'static str>,
        enabled: bool,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingService {
        fn boxed(
            name: &'static str,
            priority: i32,
            dependencies: Vec<&'static str>,
            events: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn Service> {
            Box::new(Self {
                name,
                priority,
                dependencies,
                enabled: true,
                events: events.clone(),
            })
        }
    }

    #[async_trait]
    impl Service for RecordingService {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn dependencies(&self) -> Vec<&'static str> {
            self.dependencies.clone()
        }

        fn is_enabled(&self, _config: &Config) -> bool {
            self.enabled
        }

        async fn start(
            &mut self,
            shutdown: ShutdownSignal,
        ) -> Result<Vec<JoinHandle<()>>, String> {
            self.events.lock().push(format!("start:{}", self.name));
            Ok(vec![tokio::spawn(async move { shutdown.wait().await })])
        }

        async fn stop(&mut self) -> Result<(), String> {
            self.events.lock().push(format!("stop:{}", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_in_priority_order_and_stop_in_reverse() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default(), ShutdownSignal::new());
        manager.register(RecordingService::boxed("telegram", 30, vec![], &events));
        manager.register(RecordingService::boxed("dispatcher", 10, vec![], &events));
        manager.register(RecordingService::boxed(
            "discovery",
            20,
            vec!["dispatcher"],
            &events,
        ));

        manager.start_all().await.unwrap();
        manager.stop_all().await.unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                "start:dispatcher",
                "start:discovery",
                "start:telegram",
                "stop:telegram",
                "stop:discovery",
                "stop:dispatcher",
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_services_are_skipped() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default(), ShutdownSignal::new());
        manager.register(Box::new(RecordingService {
            name: "telegram",
            priority: 30,
            dependencies: vec![],
            enabled: false,
            events: events.clone(),
        }));

        manager.start_all().await.unwrap();
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_circular_dependency_is_rejected() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default(), ShutdownSignal::new());
        manager.register(RecordingService::boxed("a", 1, vec!["b"], &events));
        manager.register(RecordingService::boxed("b", 2, vec!["a"], &events));

        assert!(manager.start_all().await.is_err());
    }
}
