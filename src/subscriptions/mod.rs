//! Subscription & filter registry
//!
//! Owns every subscriber's filter and delivery state. State lives in the
//! shared [`Database`]; the registry is the only component that mutates
//! filters, and the dispatcher is the only one that marks deliveries.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::errors::ScoutError;
use crate::logger::{self, LogTag};
use crate::profiles::{normalize_chain_id, EnrichedToken};
use crate::storage::{Database, SubscriberRecord};

/// Chat id for Telegram subscribers, `0` for the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub i64);

impl SubscriberId {
    pub const CONSOLE: SubscriberId = SubscriberId(0);
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberFilter {
    /// `None` matches every chain
    pub chain_id: Option<String>,
    pub min_followers: u64,
}

impl SubscriberFilter {
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.chain_id.is_none() && self.min_followers == 0
    }

    /// Pure predicate: chain (if set) and follower floor
    pub fn matches(&self, token: &EnrichedToken) -> bool {
        let chain_ok = self
            .chain_id
            .as_deref()
            .map_or(true, |chain| chain == token.chain_id);
        chain_ok && token.twitter_followers >= self.min_followers
    }
}

impl fmt::Display for SubscriberFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chain: {}, min followers: {}",
            self.chain_id.as_deref().unwrap_or("any"),
            self.min_followers
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub filter: SubscriberFilter,
    /// The live path only delivers tokens discovered after this sequence
    pub joined_after_sequence: u64,
    pub created_at: DateTime<Utc>,
}

impl From<SubscriberRecord> for Subscriber {
    fn from(record: SubscriberRecord) -> Self {
        Self {
            id: SubscriberId(record.id),
            filter: SubscriberFilter {
                chain_id: record.chain_id,
                min_followers: record.min_followers,
            },
            joined_after_sequence: record.joined_after_sequence,
            created_at: record.created_at,
        }
    }
}

pub struct SubscriptionRegistry {
    db: Arc<Database>,
}

impl SubscriptionRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Start a subscription with a match-all filter and an empty delivered set
    ///
    /// Re-subscribing an existing id keeps its filter and delivery state.
    pub fn create_subscriber(&self, id: SubscriberId) -> Result<Subscriber, ScoutError> {
        let latest = self.db.latest_sequence()?;
        if self.db.insert_subscriber(id.0, latest)? {
            logger::info(
                LogTag::Subscriptions,
                &format!("Subscriber {} created (joined after #{})", id, latest),
            );
        }
        self.get(id)
    }

    pub fn get(&self, id: SubscriberId) -> Result<Subscriber, ScoutError> {
        self.db
            .get_subscriber(id.0)?
            .map(Subscriber::from)
            .ok_or(ScoutError::UnknownSubscriber(id.0))
    }

    pub fn filter(&self, id: SubscriberId) -> Result<SubscriberFilter, ScoutError> {
        Ok(self.get(id)?.filter)
    }

    /// Restrict to one chain (`None` or blank clears the chain restriction)
    pub fn set_chain_filter(
        &self,
        id: SubscriberId,
        chain_id: Option<&str>,
    ) -> Result<SubscriberFilter, ScoutError> {
        let current = self.filter(id)?;
        let chain_id = chain_id
            .map(normalize_chain_id)
            .filter(|chain| !chain.is_empty());
        self.replace_filter(
            id,
            SubscriberFilter {
                chain_id,
                min_followers: current.min_followers,
            },
        )
    }

    pub fn set_min_followers(
        &self,
        id: SubscriberId,
        min_followers: u64,
    ) -> Result<SubscriberFilter, ScoutError> {
        let current = self.filter(id)?;
        self.replace_filter(
            id,
            SubscriberFilter {
                chain_id: current.chain_id,
                min_followers,
            },
        )
    }

    fn replace_filter(
        &self,
        id: SubscriberId,
        filter: SubscriberFilter,
    ) -> Result<SubscriberFilter, ScoutError> {
        if !self
            .db
            .update_subscriber_filter(id.0, filter.chain_id.as_deref(), filter.min_followers)?
        {
            return Err(ScoutError::UnknownSubscriber(id.0));
        }
        logger::debug(
            LogTag::Subscriptions,
            &format!("Subscriber {} filter set to {}", id, filter),
        );
        Ok(filter)
    }

    /// Reset to match-all and forget deliveries so history can be replayed
    pub fn clear_filters(&self, id: SubscriberId) -> Result<(), ScoutError> {
        if !self.db.reset_subscriber(id.0)? {
            return Err(ScoutError::UnknownSubscriber(id.0));
        }
        logger::info(
            LogTag::Subscriptions,
            &format!("Subscriber {} filters and delivery history cleared", id),
        );
        Ok(())
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> Result<(), ScoutError> {
        if !self.db.delete_subscriber(id.0)? {
            return Err(ScoutError::UnknownSubscriber(id.0));
        }
        logger::info(LogTag::Subscriptions, &format!("Subscriber {} removed", id));
        Ok(())
    }

    pub fn active_subscribers(&self) -> Result<Vec<Subscriber>, ScoutError> {
        Ok(self
            .db
            .list_subscribers()?
            .into_iter()
            .map(Subscriber::from)
            .collect())
    }
}
