//! External HTTP API clients

pub mod client;
pub mod dexscreener;
pub mod nitter;

pub use client::{build_http_client, RateLimiter};
pub use dexscreener::{DexScreenerClient, TokenFeed};
pub use nitter::NitterClient;
