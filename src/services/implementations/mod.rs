mod discovery_service;
mod dispatcher_service;
mod telegram_service;

pub use discovery_service::{discovery_health, DiscoveryService};
pub use dispatcher_service::DispatcherService;
pub use telegram_service::TelegramService;
