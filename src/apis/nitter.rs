/// Nitter profile scraper
///
/// Fetches `GET {instance}/{handle}` and reads the profile statistics block
/// from the HTML. A 404 or an error panel means the profile does not exist.
use crate::apis::client::RateLimiter;
use crate::errors::{network_error_from_reqwest, DataError, NetworkError, ScoutError};
use crate::logger::{self, LogTag};
use crate::social::{ProfileStats, TwitterProfile, TwitterProfileSource};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::time::Duration;

const STAT_PATTERN: &str = r#"<li class="(posts|tweets|following|followers|likes)">\s*<span class="profile-stat-header">[^<]*</span>\s*<span class="profile-stat-num">([^<]+)</span>"#;

pub struct NitterClient {
    client: Client,
    instance: String,
    timeout: Duration,
    limiter: RateLimiter,
    stat_pattern: Regex,
}

impl NitterClient {
    pub fn new(
        client: Client,
        instance: &str,
        timeout: Duration,
        requests_per_minute: usize,
        max_in_flight: usize,
    ) -> Result<Self, ScoutError> {
        let instance = instance.trim().trim_end_matches('/').to_string();
        if instance.is_empty() {
            return Err(ScoutError::Configuration(
                "Nitter instance URL is empty".to_string(),
            ));
        }

        let stat_pattern = Regex::new(STAT_PATTERN)
            .map_err(|e| ScoutError::Configuration(format!("Invalid stat pattern: {}", e)))?;

        Ok(Self {
            client,
            instance,
            timeout,
            limiter: RateLimiter::with_concurrency(requests_per_minute, max_in_flight),
            stat_pattern,
        })
    }

    /// Parse profile statistics out of a Nitter profile page
    ///
    /// Returns `None` when the page has no followers stat (error page,
    /// suspended or unknown account).
    pub fn parse_profile_page(&self, handle: &str, html: &str) -> Option<TwitterProfile> {
        if html.contains("class=\"error-panel\"") {
            return None;
        }

        let mut stats = ProfileStats::default();
        let mut saw_followers = false;

        for capture in self.stat_pattern.captures_iter(html) {
            let value = parse_stat_number(&capture[2]);
            match &capture[1] {
                "posts" | "tweets" => stats.tweets = value,
                "following" => stats.following = value,
                "followers" => {
                    stats.followers = value;
                    saw_followers = true;
                }
                "likes" => stats.likes = value,
                _ => {}
            }
        }

        saw_followers.then(|| TwitterProfile {
            username: handle.to_string(),
            stats,
        })
    }
}

/// "12,345" / "12.345" / " 12 345 " -> 12345
fn parse_stat_number(raw: &str) -> u64 {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

#[async_trait]
impl TwitterProfileSource for NitterClient {
    async fn get_profile_info(&self, handle: &str) -> Result<Option<TwitterProfile>, ScoutError> {
        let url = format!("{}/{}", self.instance, handle);
        let endpoint = format!("nitter/{}", handle);
        let timeout_ms = self.timeout.as_millis() as u64;

        logger::debug(LogTag::Twitter, &format!("[NITTER] Fetching profile {}", url));

        let _guard = self.limiter.acquire().await?;
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| network_error_from_reqwest(&endpoint, timeout_ms, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                endpoint,
                status: status.as_u16(),
                body: None,
            }
            .into());
        }

        let html = response.text().await.map_err(|e| DataError::Decode {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

        Ok(self.parse_profile_page(handle, &html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NitterClient {
        NitterClient::new(Client::new(), "https://nitter.example/", Duration::from_secs(1), 0, 1)
            .expect("client")
    }

    const PROFILE_HTML: &str = r#"
        <div class="profile-card-extra-links">
          <ul class="profile-statlist">
            <li class="posts"><span class="profile-stat-header">Posts</span><span class="profile-stat-num">1,024</span></li>
            <li class="following"><span class="profile-stat-header">Following</span><span class="profile-stat-num">88</span></li>
            <li class="followers"><span class="profile-stat-header">Followers</span><span class="profile-stat-num">12,345</span></li>
            <li class="likes"><span class="profile-stat-header">Likes</span><span class="profile-stat-num">7</span></li>
          </ul>
        </div>"#;

    #[test]
    fn test_parse_profile_stats() {
        let profile = client().parse_profile_page("foo", PROFILE_HTML).expect("profile");
        assert_eq!(profile.username, "foo");
        assert_eq!(profile.stats.followers, 12_345);
        assert_eq!(profile.stats.following, 88);
        assert_eq!(profile.stats.tweets, 1_024);
        assert_eq!(profile.stats.likes, 7);
    }

    #[test]
    fn test_error_panel_is_missing_profile() {
        let html = r#"<div class="error-panel"><span>User "foo" not found</span></div>"#;
        assert!(client().parse_profile_page("foo", html).is_none());
    }

    #[test]
    fn test_page_without_stats_is_missing_profile() {
        assert!(client().parse_profile_page("foo", "<html></html>").is_none());
    }

    #[test]
    fn test_instance_trailing_slash_trimmed() {
        assert_eq!(client().instance, "https://nitter.example");
    }

    #[test]
    fn test_stat_number_parsing() {
        assert_eq!(parse_stat_number("12,345"), 12_345);
        assert_eq!(parse_stat_number(" 1 000 "), 1_000);
        assert_eq!(parse_stat_number("n/a"), 0);
    }
}
