/// DexScreener token-profile feed client
///
/// Endpoint: `GET /token-profiles/latest/v1` (public, unauthenticated).
/// Returns a JSON array of the most recently published token profiles; the
/// listing is a sliding window, so the same profiles reappear across polls.
use crate::apis::client::RateLimiter;
use crate::errors::{network_error_from_reqwest, DataError, NetworkError, ScoutError};
use crate::logger::{self, LogTag};
use crate::profiles::RawTokenProfile;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_PROFILES_URL: &str = "https://api.dexscreener.com/token-profiles/latest/v1";

/// Endpoint label used in logs and errors
const ENDPOINT: &str = "token-profiles/latest/v1";

/// Source of raw token profiles polled by the discovery loop
#[async_trait]
pub trait TokenFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the current listing. Transport and HTTP failures are `Network`
    /// errors; an undecodable body is a `Data` error.
    async fn fetch_latest(&self) -> Result<Vec<RawTokenProfile>, ScoutError>;
}

pub struct DexScreenerClient {
    client: Client,
    url: String,
    timeout: Duration,
    limiter: RateLimiter,
}

impl DexScreenerClient {
    pub fn new(
        client: Client,
        url: &str,
        timeout: Duration,
        requests_per_minute: usize,
    ) -> Result<Self, ScoutError> {
        if timeout.is_zero() {
            return Err(ScoutError::Configuration(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
            limiter: RateLimiter::new(requests_per_minute),
        })
    }
}

#[async_trait]
impl TokenFeed for DexScreenerClient {
    fn name(&self) -> &str {
        "DexScreener"
    }

    async fn fetch_latest(&self) -> Result<Vec<RawTokenProfile>, ScoutError> {
        logger::debug(LogTag::Feed, "[DEXSCREENER] Fetching latest token profiles");

        let guard = self.limiter.acquire().await?;
        let timeout_ms = self.timeout.as_millis() as u64;
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| network_error_from_reqwest(ENDPOINT, timeout_ms, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            return Err(NetworkError::HttpStatus {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| network_error_from_reqwest(ENDPOINT, timeout_ms, &e))?;
        drop(guard);

        let profiles = decode_profiles(&body)?;
        logger::debug(
            LogTag::Feed,
            &format!("[DEXSCREENER] Received {} profiles", profiles.len()),
        );
        Ok(profiles)
    }
}

/// Decode the listing body
///
/// The top level must be an array. Elements that are not decodable profile
/// objects become empty records, which downstream validation skips like any
/// other record without a token address.
pub fn decode_profiles(body: &[u8]) -> Result<Vec<RawTokenProfile>, DataError> {
    let items: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| DataError::Decode {
            endpoint: ENDPOINT.to_string(),
            message: e.to_string(),
        })?;

    Ok(items
        .into_iter()
        .map(|item| serde_json::from_value::<RawTokenProfile>(item).unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_listing() {
        let body = br#"[
            {
                "url": "https://dexscreener.com/solana/abc",
                "chainId": "solana",
                "tokenAddress": "AbC123",
                "icon": "https://cdn/icon.png",
                "description": "first",
                "links": [
                    {"type": "twitter", "url": "https://x.com/abc"},
                    {"label": "Website", "url": "https://abc.xyz"}
                ]
            },
            {"chainId": "base", "tokenAddress": "0xdef", "links": null}
        ]"#;

        let profiles = decode_profiles(body).expect("decode");
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].token_address.as_deref(), Some("AbC123"));
        let links = profiles[0].links.as_ref().expect("links");
        assert_eq!(links[0].link_type.as_deref(), Some("twitter"));
        assert_eq!(links[1].label.as_deref(), Some("Website"));
        assert!(profiles[1].links.is_none());
    }

    #[test]
    fn test_non_object_elements_become_empty_records() {
        let profiles = decode_profiles(br#"[42, {"tokenAddress": "x"}]"#).expect("decode");
        assert_eq!(profiles.len(), 2);
        assert!(profiles[0].token_address.is_none());
        assert_eq!(profiles[1].token_address.as_deref(), Some("x"));
    }

    #[test]
    fn test_non_array_body_is_data_error() {
        let err = decode_profiles(br#"{"error": "rate limited"}"#).unwrap_err();
        assert!(matches!(err, DataError::Decode { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = DexScreenerClient::new(Client::new(), DEFAULT_PROFILES_URL, Duration::ZERO, 60);
        assert!(matches!(result, Err(ScoutError::Configuration(_))));
    }
}
