//! TokenScout: polls a public token-profile feed, enriches new tokens with
//! social metrics and delivers filtered alerts to subscribers.

pub mod apis;
pub mod arguments;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod enrichment;
pub mod errors;
pub mod logger;
pub mod paths;
pub mod profiles;
pub mod run;
pub mod services;
pub mod shutdown;
pub mod social;
pub mod storage;
pub mod subscriptions;
pub mod telegram;
