//! Enrichment coordinator
//!
//! Turns a [`TokenProfile`] into a [`TokenEnrichment`]: classifies its links
//! into website / twitter / telegram and resolves both social metrics
//! concurrently. Per-token latency is bounded by the slower resolver's
//! timeout, not the sum of both.

use crate::logger::{self, LogTag};
use crate::profiles::{Link, TokenEnrichment, TokenProfile};
use crate::social::{TelegramResolver, TwitterResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkCategory {
    Website,
    Twitter,
    Telegram,
}

impl LinkCategory {
    /// Checked in this order; a link belongs to the first category it matches
    const ORDERED: [LinkCategory; 3] = [
        LinkCategory::Website,
        LinkCategory::Twitter,
        LinkCategory::Telegram,
    ];

    fn keyword(&self) -> &'static str {
        match self {
            LinkCategory::Website => "website",
            LinkCategory::Twitter => "twitter",
            LinkCategory::Telegram => "telegram",
        }
    }

    fn classify(link: &Link) -> Option<Self> {
        let link_type = link.link_type.as_deref().unwrap_or_default().to_lowercase();
        let label = link.label.as_deref().unwrap_or_default().to_lowercase();
        Self::ORDERED
            .into_iter()
            .find(|c| link_type.contains(c.keyword()) || label.contains(c.keyword()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
}

/// Classify links by `type` or `label` (case-insensitive substring match)
///
/// The first link of each category wins; later links of the same category
/// are ignored.
pub fn extract_links(links: &[Link]) -> ExtractedLinks {
    let mut extracted = ExtractedLinks::default();

    for link in links {
        let slot = match LinkCategory::classify(link) {
            Some(LinkCategory::Website) => &mut extracted.website,
            Some(LinkCategory::Twitter) => &mut extracted.twitter,
            Some(LinkCategory::Telegram) => &mut extracted.telegram,
            None => continue,
        };
        if slot.is_none() {
            *slot = Some(link.url.clone());
        }
    }

    extracted
}

pub struct EnrichmentCoordinator {
    twitter: TwitterResolver,
    telegram: TelegramResolver,
}

impl EnrichmentCoordinator {
    pub fn new(twitter: TwitterResolver, telegram: TelegramResolver) -> Self {
        Self { twitter, telegram }
    }

    /// Coordinator that only extracts links (no lookups)
    pub fn links_only() -> Self {
        Self::new(TwitterResolver::disabled(), TelegramResolver::disabled())
    }

    /// Enrich one profile; never fails (metrics default to `0`)
    pub async fn enrich(&self, profile: TokenProfile) -> TokenEnrichment {
        let links = extract_links(&profile.links);

        let twitter_lookup = async {
            match links.twitter.as_deref() {
                Some(url) => self.twitter.resolve_followers(url).await,
                None => 0,
            }
        };
        let telegram_lookup = async {
            match links.telegram.as_deref() {
                Some(url) => self.telegram.resolve_members(url).await,
                None => 0,
            }
        };
        let (twitter_followers, telegram_members) = tokio::join!(twitter_lookup, telegram_lookup);

        logger::debug(
            LogTag::Enrichment,
            &format!(
                "Enriched {} ({}): followers={} members={}",
                profile.token_address, profile.chain_id, twitter_followers, telegram_members
            ),
        );

        TokenEnrichment {
            profile,
            website_url: links.website,
            twitter_url: links.twitter,
            twitter_followers,
            telegram_url: links.telegram,
            telegram_members,
        }
    }
}
