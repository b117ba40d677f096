//! Twitter/X follower-count resolver

use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// First path segments that are site sections rather than profiles
const RESERVED_PATHS: &[&str] = &[
    "i",
    "intent",
    "home",
    "search",
    "hashtag",
    "share",
    "explore",
    "notifications",
    "messages",
    "settings",
];

const MAX_HANDLE_LEN: usize = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub tweets: u64,
    pub following: u64,
    pub followers: u64,
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterProfile {
    pub username: String,
    pub stats: ProfileStats,
}

/// Profile lookup service (`getProfileInfo(handle)`)
///
/// `Ok(None)` means the profile does not exist or is not visible.
#[async_trait]
pub trait TwitterProfileSource: Send + Sync {
    async fn get_profile_info(&self, handle: &str) -> Result<Option<TwitterProfile>, ScoutError>;
}

/// Extract the handle from a Twitter/X profile or status URL
///
/// `https://twitter.com/foo/status/123` → `foo`. Anything that is not a
/// profile URL on x.com / twitter.com yields `None`.
pub fn parse_twitter_handle(twitter_url: &str) -> Option<String> {
    let base = twitter_url.trim().split("/status/").next()?;
    let url = Url::parse(base).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("mobile."))
        .unwrap_or(&host);
    if host != "x.com" && host != "twitter.com" {
        return None;
    }

    let segment = url.path_segments()?.find(|s| !s.is_empty())?;
    let handle = segment.trim_start_matches('@');

    let valid = !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_PATHS.contains(&handle.to_lowercase().as_str());

    valid.then(|| handle.to_string())
}

/// Resolves Twitter/X URLs to follower counts
pub struct TwitterResolver {
    source: Option<Arc<dyn TwitterProfileSource>>,
    timeout: Duration,
}

impl TwitterResolver {
    pub fn new(source: Arc<dyn TwitterProfileSource>, timeout: Duration) -> Self {
        Self {
            source: Some(source),
            timeout,
        }
    }

    /// Resolver that parses URLs but never performs lookups
    pub fn disabled() -> Self {
        Self {
            source: None,
            timeout: super::DEFAULT_RESOLVER_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    /// Follower count for a profile URL, `0` on any failure
    pub async fn resolve_followers(&self, twitter_url: &str) -> u64 {
        let Some(handle) = parse_twitter_handle(twitter_url) else {
            logger::debug(
                LogTag::Twitter,
                &format!("Not a Twitter profile URL: {}", twitter_url),
            );
            return 0;
        };

        let Some(source) = &self.source else {
            return 0;
        };

        match tokio::time::timeout(self.timeout, source.get_profile_info(&handle)).await {
            Ok(Ok(Some(profile))) => {
                logger::debug(
                    LogTag::Twitter,
                    &format!("@{} has {} followers", handle, profile.stats.followers),
                );
                profile.stats.followers
            }
            Ok(Ok(None)) => {
                logger::debug(LogTag::Twitter, &format!("Profile @{} not found", handle));
                0
            }
            Ok(Err(e)) => {
                logger::warning(
                    LogTag::Twitter,
                    &format!("Follower lookup for @{} failed: {}", handle, e),
                );
                0
            }
            Err(_) => {
                logger::warning(
                    LogTag::Twitter,
                    &format!(
                        "Follower lookup for @{} timed out after {}s",
                        handle,
                        self.timeout.as_secs_f64()
                    ),
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Followers(u64),
        Missing,
        Fail,
        Hang,
    }

    struct FakeSource {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TwitterProfileSource for FakeSource {
        async fn get_profile_info(
            &self,
            handle: &str,
        ) -> Result<Option<TwitterProfile>, ScoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Followers(followers) => Ok(Some(TwitterProfile {
                    username: handle.to_string(),
                    stats: ProfileStats {
                        followers,
                        ..Default::default()
                    },
                })),
                Behavior::Missing => Ok(None),
                Behavior::Fail => Err(NetworkError::Request {
                    endpoint: "nitter".to_string(),
                    message: "connection reset".to_string(),
                }
                .into()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(None)
                }
            }
        }
    }

    #[test]
    fn test_parse_status_url() {
        assert_eq!(
            parse_twitter_handle("https://twitter.com/foo/status/123").as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn test_parse_profile_variants() {
        assert_eq!(parse_twitter_handle("https://x.com/foo").as_deref(), Some("foo"));
        assert_eq!(parse_twitter_handle("https://x.com/foo/").as_deref(), Some("foo"));
        assert_eq!(
            parse_twitter_handle("https://www.x.com/Foo_Bar?s=21").as_deref(),
            Some("Foo_Bar")
        );
        assert_eq!(
            parse_twitter_handle("http://mobile.twitter.com/@foo").as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn test_parse_rejects_invalid_shapes() {
        assert_eq!(parse_twitter_handle("https://x.com/"), None);
        assert_eq!(parse_twitter_handle("https://x.com/i/communities/1799"), None);
        assert_eq!(parse_twitter_handle("https://x.com/intent/follow?x=1"), None);
        assert_eq!(parse_twitter_handle("https://example.com/foo"), None);
        assert_eq!(parse_twitter_handle("x.com/foo"), None);
        assert_eq!(parse_twitter_handle("https://x.com/this_handle_is_far_too_long"), None);
        assert_eq!(parse_twitter_handle("not a url"), None);
    }

    #[tokio::test]
    async fn test_resolves_followers() {
        let source = FakeSource::new(Behavior::Followers(1234));
        let resolver = TwitterResolver::new(source.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_followers("https://x.com/foo").await, 1234);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_call() {
        let source = FakeSource::new(Behavior::Followers(10));
        let resolver = TwitterResolver::new(source.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_followers("https://x.com/i/lists/1").await, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_resolve_to_zero() {
        for behavior in [Behavior::Missing, Behavior::Fail] {
            let resolver = TwitterResolver::new(FakeSource::new(behavior), Duration::from_secs(1));
            assert_eq!(resolver.resolve_followers("https://x.com/foo").await, 0);
        }
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_zero() {
        let resolver =
            TwitterResolver::new(FakeSource::new(Behavior::Hang), Duration::from_millis(50));
        let start = std::time::Instant::now();
        assert_eq!(resolver.resolve_followers("https://x.com/foo").await, 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_disabled_resolver_returns_zero() {
        let resolver = TwitterResolver::disabled();
        assert!(!resolver.is_enabled());
        assert_eq!(resolver.resolve_followers("https://x.com/foo").await, 0);
    }
}
