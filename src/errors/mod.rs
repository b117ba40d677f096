/// Error taxonomy for the discovery and delivery pipeline
///
/// Categories follow how each failure is handled:
/// - `Network`: transient, the poller backs off and retries
/// - `Data`: malformed upstream payloads
/// - `Storage`: the TokenLog or subscriber store could not be read/written
/// - `UnknownSubscriber` / `Delivery`: subscriber-facing operations
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScoutError {
    #[error("Network Error: {0}")]
    Network(#[from] NetworkError),

    #[error("Data Error: {0}")]
    Data(#[from] DataError),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Unknown subscriber {0}")]
    UnknownSubscriber(i64),

    #[error("Delivery Error: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection timeout to {endpoint} after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP {status} from {endpoint}: {}", body.as_deref().unwrap_or("No body"))]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },

    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("Rate limiter error: {0}")]
    RateLimiter(String),
}

#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ScoutError {
    /// Failures that are expected to clear up on their own
    pub fn is_transient(&self) -> bool {
        matches!(self, ScoutError::Network(_))
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        ScoutError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for ScoutError {
    fn from(err: anyhow::Error) -> Self {
        ScoutError::Storage(format!("{:#}", err))
    }
}

/// Classify a reqwest failure against the endpoint it targeted
pub fn network_error_from_reqwest(
    endpoint: &str,
    timeout_ms: u64,
    err: &reqwest::Error,
) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms,
        }
    } else {
        NetworkError::Request {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_transient() {
        let err: ScoutError = NetworkError::HttpStatus {
            endpoint: "token-profiles/latest/v1".to_string(),
            status: 503,
            body: None,
        }
        .into();
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Network Error: HTTP 503 from token-profiles/latest/v1: No body"
        );
    }

    #[test]
    fn test_storage_errors_are_not_transient() {
        let err: ScoutError = anyhow::anyhow!("disk full").into();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("disk full"));
    }
}
