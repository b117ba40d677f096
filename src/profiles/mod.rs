//! Token profile data model
//!
//! - [`RawTokenProfile`]: the upstream record exactly as decoded, every field optional
//! - [`TokenProfile`]: a validated profile (has a token address, chain normalized)
//! - [`TokenEnrichment`]: a profile plus resolved links and social metrics, not yet persisted
//! - [`EnrichedToken`]: an enrichment recorded in the TokenLog with its discovery sequence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the upstream listing
///
/// Only the consumed fields are modelled; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenProfile {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<RawLink>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLink {
    #[serde(default, rename = "type")]
    pub link_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub link_type: Option<String>,
    pub label: Option<String>,
    pub url: String,
}

/// Immutable description of a newly listed token
///
/// Identity is `token_address` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenProfile {
    /// Lowercase chain identifier ("solana", "base", ...)
    pub chain_id: String,
    pub token_address: String,
    pub description: String,
    pub links: Vec<Link>,
}

impl TokenProfile {
    /// Validate an upstream record
    ///
    /// Returns `None` when the record has no usable token address, since it
    /// cannot be deduplicated. Links without a URL are dropped.
    pub fn from_raw(raw: RawTokenProfile) -> Option<Self> {
        let token_address = raw.token_address?.trim().to_string();
        if token_address.is_empty() {
            return None;
        }

        let links = raw
            .links
            .unwrap_or_default()
            .into_iter()
            .filter_map(|link| {
                let url = link.url?.trim().to_string();
                if url.is_empty() {
                    return None;
                }
                Some(Link {
                    link_type: link.link_type,
                    label: link.label,
                    url,
                })
            })
            .collect();

        Some(Self {
            chain_id: normalize_chain_id(raw.chain_id.as_deref().unwrap_or_default()),
            token_address,
            description: raw.description.unwrap_or_default(),
            links,
        })
    }
}

pub fn normalize_chain_id(chain_id: &str) -> String {
    chain_id.trim().to_lowercase()
}

/// Output of the enrichment coordinator for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEnrichment {
    pub profile: TokenProfile,
    pub website_url: Option<String>,
    pub twitter_url: Option<String>,
    pub twitter_followers: u64,
    pub telegram_url: Option<String>,
    pub telegram_members: u64,
}

impl TokenEnrichment {
    /// Enrichment with no resolved links or metrics
    pub fn bare(profile: TokenProfile) -> Self {
        Self {
            profile,
            website_url: None,
            twitter_url: None,
            twitter_followers: 0,
            telegram_url: None,
            telegram_members: 0,
        }
    }
}

/// A token recorded in the TokenLog; never mutated after persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedToken {
    /// Strictly increasing with TokenLog insertion order
    pub discovery_sequence: u64,
    pub discovered_at: DateTime<Utc>,
    pub chain_id: String,
    pub token_address: String,
    pub description: String,
    pub links: Vec<Link>,
    pub website_url: Option<String>,
    pub twitter_url: Option<String>,
    pub twitter_followers: u64,
    pub telegram_url: Option<String>,
    pub telegram_members: u64,
}

impl EnrichedToken {
    pub fn from_enrichment(
        enrichment: TokenEnrichment,
        discovery_sequence: u64,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        let TokenEnrichment {
            profile,
            website_url,
            twitter_url,
            twitter_followers,
            telegram_url,
            telegram_members,
        } = enrichment;

        Self {
            discovery_sequence,
            discovered_at,
            chain_id: profile.chain_id,
            token_address: profile.token_address,
            description: profile.description,
            links: profile.links,
            website_url,
            twitter_url,
            twitter_followers,
            telegram_url,
            telegram_members,
        }
    }
}
