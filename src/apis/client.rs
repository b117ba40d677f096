/// Base HTTP plumbing shared by the API clients
use crate::errors::NetworkError;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Rate limiter for API clients
///
/// Spaces request starts at least `60 / max_per_minute` seconds apart and caps
/// the number of requests in flight.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
    max_per_minute: usize,
    max_in_flight: usize,
}

impl RateLimiter {
    /// One request in flight at a time
    pub fn new(max_per_minute: usize) -> Self {
        Self::with_concurrency(max_per_minute, 1)
    }

    pub fn with_concurrency(max_per_minute: usize, max_in_flight: usize) -> Self {
        let min_interval = if max_per_minute > 0 {
            Duration::from_secs_f64(60.0 / max_per_minute as f64)
        } else {
            Duration::ZERO
        };

        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            last_request: Arc::new(Mutex::new(None)),
            min_interval,
            max_per_minute,
            max_in_flight,
        }
    }

    /// Wait until a request may start; hold the guard until it completes
    pub async fn acquire(&self) -> Result<RateLimitGuard, NetworkError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| NetworkError::RateLimiter(e.to_string()))?;

        if !self.min_interval.is_zero() {
            // Reserve the next start slot under the lock, sleep outside it
            let wait = {
                let mut last = self.last_request.lock().await;
                let now = Instant::now();
                let next_start = match *last {
                    Some(previous) if previous + self.min_interval > now => {
                        previous + self.min_interval
                    }
                    _ => now,
                };
                *last = Some(next_start);
                next_start.saturating_duration_since(now)
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn max_per_minute(&self) -> usize {
        self.max_per_minute
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

/// RAII guard returned by [`RateLimiter::acquire`]
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}

/// Build the shared reqwest client with a default timeout and user agent
pub fn build_http_client(timeout: Duration) -> Result<Client, NetworkError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("tokenscout/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| NetworkError::Request {
            endpoint: "client-builder".to_string(),
            message: e.to_string(),
        })
}
