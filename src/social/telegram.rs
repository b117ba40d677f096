//! Telegram member-count resolver
//!
//! Resolution is two-step: look up the entity behind `t.me/<username>`, then,
//! for broadcast channels and megagroups only, request the full channel
//! record, because the basic entity omits the participant count for those
//! kinds. Plain groups carry the count on the entity itself.

use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What a public username points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramEntity {
    BroadcastChannel { id: i64 },
    Megagroup { id: i64 },
    Group {
        id: i64,
        participants_count: Option<u64>,
    },
    /// A user or bot account; has no member count
    User,
    Private,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullChannel {
    pub participants_count: Option<u64>,
}

/// Telegram client service (`getEntity`, `getFullChannel`)
#[async_trait]
pub trait TelegramDirectory: Send + Sync {
    async fn get_entity(&self, username: &str) -> Result<TelegramEntity, ScoutError>;

    async fn get_full_channel(&self, entity: &TelegramEntity) -> Result<FullChannel, ScoutError>;
}

/// Extract the public username from a `t.me` link
///
/// Invite links (`t.me/+…`, `t.me/joinchat/…`) and private message links
/// (`t.me/c/…`) have no resolvable username and yield `None`.
/// `t.me/s/<name>` (web preview) yields `<name>`.
pub fn parse_telegram_username(telegram_url: &str) -> Option<String> {
    let url = Url::parse(telegram_url.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host != "t.me" && host != "telegram.me" {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let mut first = segments.next()?;
    if first == "s" {
        first = segments.next()?;
    }
    if first == "joinchat" || first == "c" || first.starts_with('+') {
        return None;
    }

    let username = first.trim_start_matches('@');
    let valid = (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    valid.then(|| username.to_string())
}

/// Resolves Telegram links to member counts
pub struct TelegramResolver {
    directory: Option<Arc<dyn TelegramDirectory>>,
    timeout: Duration,
}

impl TelegramResolver {
    pub fn new(directory: Arc<dyn TelegramDirectory>, timeout: Duration) -> Self {
        Self {
            directory: Some(directory),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            directory: None,
            timeout: super::DEFAULT_RESOLVER_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Member count for a Telegram link, `0` on any failure
    ///
    /// The timeout bounds the entity and full-channel lookups together.
    pub async fn resolve_members(&self, telegram_url: &str) -> u64 {
        let Some(username) = parse_telegram_username(telegram_url) else {
            logger::debug(
                LogTag::Telegram,
                &format!("Invalid Telegram URL: {}", telegram_url),
            );
            return 0;
        };

        let Some(directory) = &self.directory else {
            return 0;
        };

        match tokio::time::timeout(self.timeout, lookup_members(directory.as_ref(), &username))
            .await
        {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                logger::warning(
                    LogTag::Telegram,
                    &format!("Member lookup for {} failed: {}", username, e),
                );
                0
            }
            Err(_) => {
                logger::warning(
                    LogTag::Telegram,
                    &format!(
                        "Member lookup for {} timed out after {}s",
                        username,
                        self.timeout.as_secs_f64()
                    ),
                );
                0
            }
        }
    }
}

async fn lookup_members(
    directory: &dyn TelegramDirectory,
    username: &str,
) -> Result<u64, ScoutError> {
    let entity = directory.get_entity(username).await?;

    let count = match &entity {
        TelegramEntity::BroadcastChannel { .. } | TelegramEntity::Megagroup { .. } => {
            directory.get_full_channel(&entity).await?.participants_count
        }
        TelegramEntity::Group {
            participants_count, ..
        } => *participants_count,
        TelegramEntity::User => {
            logger::debug(
                LogTag::Telegram,
                &format!("{} is a user account, not a group", username),
            );
            return Ok(0);
        }
        TelegramEntity::Private | TelegramEntity::NotFound => {
            logger::debug(
                LogTag::Telegram,
                &format!("{} is private or does not exist", username),
            );
            return Ok(0);
        }
    };

    match count {
        Some(count) => {
            logger::debug(
                LogTag::Telegram,
                &format!("{} has {} members", username, count),
            );
            Ok(count)
        }
        None => {
            logger::warning(
                LogTag::Telegram,
                &format!("Participant count not available for {}", username),
            );
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use parking_lot::Mutex;

    struct FakeDirectory {
        entity: Result<TelegramEntity, ScoutError>,
        full: FullChannel,
        delay: Duration,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDirectory {
        fn new(entity: Result<TelegramEntity, ScoutError>, full: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                entity,
                full: FullChannel {
                    participants_count: full,
                },
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl TelegramDirectory for FakeDirectory {
        async fn get_entity(&self, username: &str) -> Result<TelegramEntity, ScoutError> {
            self.calls.lock().push(format!("entity:{}", username));
            tokio::time::sleep(self.delay).await;
            self.entity.clone()
        }

        async fn get_full_channel(
            &self,
            _entity: &TelegramEntity,
        ) -> Result<FullChannel, ScoutError> {
            self.calls.lock().push("full".to_string());
            Ok(self.full.clone())
        }
    }

    #[test]
    fn test_parse_username() {
        assert_eq!(parse_telegram_username("https://t.me/mytoken").as_deref(), Some("mytoken"));
        assert_eq!(
            parse_telegram_username("https://t.me/mytoken?start=1").as_deref(),
            Some("mytoken")
        );
        assert_eq!(
            parse_telegram_username("https://t.me/s/mytoken").as_deref(),
            Some("mytoken")
        );
        assert_eq!(
            parse_telegram_username("http://telegram.me/my_token/").as_deref(),
            Some("my_token")
        );
    }

    #[test]
    fn test_parse_rejects_unresolvable_links() {
        assert_eq!(parse_telegram_username("https://t.me/+AbCdEf123"), None);
        assert_eq!(parse_telegram_username("https://t.me/joinchat/AbCdEf"), None);
        assert_eq!(parse_telegram_username("https://t.me/c/12345/6"), None);
        assert_eq!(parse_telegram_username("https://discord.gg/mytoken"), None);
        assert_eq!(parse_telegram_username("t.me/mytoken"), None);
        assert_eq!(parse_telegram_username("https://t.me/"), None);
    }

    #[tokio::test]
    async fn test_channel_uses_full_lookup() {
        let directory = FakeDirectory::new(Ok(TelegramEntity::BroadcastChannel { id: 1 }), Some(900));
        let resolver = TelegramResolver::new(directory.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_members("https://t.me/chan").await, 900);
        assert_eq!(directory.calls(), vec!["entity:chan", "full"]);
    }

    #[tokio::test]
    async fn test_megagroup_uses_full_lookup() {
        let directory = FakeDirectory::new(Ok(TelegramEntity::Megagroup { id: 2 }), Some(42));
        let resolver = TelegramResolver::new(directory.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_members("https://t.me/group").await, 42);
        assert_eq!(directory.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_plain_group_reads_entity_count() {
        let directory = FakeDirectory::new(
            Ok(TelegramEntity::Group {
                id: 3,
                participants_count: Some(17),
            }),
            Some(999),
        );
        let resolver = TelegramResolver::new(directory.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_members("https://t.me/small").await, 17);
        assert_eq!(directory.calls(), vec!["entity:small"]);
    }

    #[tokio::test]
    async fn test_missing_count_and_entities_resolve_to_zero() {
        let cases = vec![
            (Ok(TelegramEntity::BroadcastChannel { id: 1 }), None),
            (Ok(TelegramEntity::NotFound), Some(5)),
            (Ok(TelegramEntity::Private), Some(5)),
            (Ok(TelegramEntity::User), Some(5)),
            (
                Err(NetworkError::Request {
                    endpoint: "getChat".to_string(),
                    message: "boom".to_string(),
                }
                .into()),
                Some(5),
            ),
        ];
        for (entity, full) in cases {
            let resolver =
                TelegramResolver::new(FakeDirectory::new(entity, full), Duration::from_secs(1));
            assert_eq!(resolver.resolve_members("https://t.me/whatever").await, 0);
        }
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_call() {
        let directory = FakeDirectory::new(Ok(TelegramEntity::Megagroup { id: 2 }), Some(42));
        let resolver = TelegramResolver::new(directory.clone(), Duration::from_secs(1));
        assert_eq!(resolver.resolve_members("https://t.me/+invite").await, 0);
        assert!(directory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_zero() {
        let directory = Arc::new(FakeDirectory {
            entity: Ok(TelegramEntity::Megagroup { id: 2 }),
            full: FullChannel {
                participants_count: Some(42),
            },
            delay: Duration::from_secs(5),
            calls: Mutex::new(Vec::new()),
        });
        let resolver = TelegramResolver::new(directory, Duration::from_millis(50));
        assert_eq!(resolver.resolve_members("https://t.me/slow").await, 0);
    }
}
