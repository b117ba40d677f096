//! Subscriber filters, delivered sets and the dispatch watermark

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashSet;

use super::{format_timestamp, parse_timestamp, Database};

const WATERMARK_KEY: &str = "dispatch_watermark";

/// Persisted subscriber row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub id: i64,
    pub chain_id: Option<String>,
    pub min_followers: u64,
    /// Latest TokenLog sequence when the subscriber was created
    pub joined_after_sequence: u64,
    pub created_at: DateTime<Utc>,
}

fn subscriber_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriberRecord> {
    let created_at: String = row.get(4)?;
    Ok(SubscriberRecord {
        id: row.get(0)?,
        chain_id: row.get(1)?,
        min_followers: row.get(2)?,
        joined_after_sequence: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

impl Database {
    /// Insert a match-all subscriber; returns `false` if `id` already exists
    pub fn insert_subscriber(&self, id: i64, joined_after_sequence: u64) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO subscribers (id, chain_id, min_followers, joined_after_sequence, created_at)
                 VALUES (?1, NULL, 0, ?2, ?3)",
                params![id, joined_after_sequence, format_timestamp(&Utc::now())],
            )
            .with_context(|| format!("Failed to insert subscriber {}", id))?;
        Ok(inserted > 0)
    }

    pub fn get_subscriber(&self, id: i64) -> Result<Option<SubscriberRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, chain_id, min_followers, joined_after_sequence, created_at
                 FROM subscribers WHERE id = ?1",
                params![id],
                subscriber_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_subscribers(&self) -> Result<Vec<SubscriberRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, chain_id, min_followers, joined_after_sequence, created_at
             FROM subscribers ORDER BY id",
        )?;
        let rows = stmt.query_map([], subscriber_from_row)?;

        let mut subscribers = Vec::new();
        for record in rows {
            subscribers.push(record?);
        }
        Ok(subscribers)
    }

    /// Replace a subscriber's filter wholesale; `false` if the id is unknown
    pub fn update_subscriber_filter(
        &self,
        id: i64,
        chain_id: Option<&str>,
        min_followers: u64,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE subscribers SET chain_id = ?2, min_followers = ?3 WHERE id = ?1",
                params![id, chain_id, min_followers],
            )
            .with_context(|| format!("Failed to update filter for subscriber {}", id))?;
        Ok(updated > 0)
    }

    /// Reset the filter to match-all and forget every delivery, atomically
    pub fn reset_subscriber(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE subscribers SET chain_id = NULL, min_followers = 0 WHERE id = ?1",
            params![id],
        )?;
        if updated > 0 {
            tx.execute(
                "DELETE FROM deliveries WHERE subscriber_id = ?1",
                params![id],
            )?;
        }
        tx.commit()
            .with_context(|| format!("Failed to reset subscriber {}", id))?;
        Ok(updated > 0)
    }

    /// Delete a subscriber together with its delivered set
    pub fn delete_subscriber(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM deliveries WHERE subscriber_id = ?1",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM subscribers WHERE id = ?1", params![id])?;
        tx.commit()
            .with_context(|| format!("Failed to delete subscriber {}", id))?;
        Ok(deleted > 0)
    }

    pub fn is_delivered(&self, subscriber_id: i64, token_address: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM deliveries WHERE subscriber_id = ?1 AND token_address = ?2",
                params![subscriber_id, token_address],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delivered_addresses(&self, subscriber_id: i64) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT token_address FROM deliveries WHERE subscriber_id = ?1")?;
        let rows = stmt.query_map(params![subscriber_id], |row| row.get::<_, String>(0))?;

        let mut delivered = HashSet::new();
        for address in rows {
            delivered.insert(address?);
        }
        Ok(delivered)
    }

    /// Record a delivery attempt; `false` if it was already recorded
    pub fn mark_delivered(&self, subscriber_id: i64, token_address: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO deliveries (subscriber_id, token_address, delivered_at)
                 VALUES (?1, ?2, ?3)",
                params![subscriber_id, token_address, format_timestamp(&Utc::now())],
            )
            .with_context(|| {
                format!(
                    "Failed to mark {} delivered to subscriber {}",
                    token_address, subscriber_id
                )
            })?;
        Ok(inserted > 0)
    }

    pub fn delivery_count(&self, subscriber_id: i64) -> Result<u64> {
        let conn = self.conn.lock();
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM deliveries WHERE subscriber_id = ?1",
            params![subscriber_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Last sequence fully handled by the live dispatch path
    pub fn get_dispatch_watermark(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let watermark: Option<u64> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![WATERMARK_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(watermark.unwrap_or(0))
    }

    /// Advance the watermark; never moves it backwards
    pub fn advance_dispatch_watermark(&self, sequence: u64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)",
            params![WATERMARK_KEY, sequence],
        )
        .context("Failed to advance dispatch watermark")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_subscriber(7, 3).unwrap());
        db.update_subscriber_filter(7, Some("solana"), 10).unwrap();
        assert!(!db.insert_subscriber(7, 99).unwrap());

        let record = db.get_subscriber(7).unwrap().unwrap();
        assert_eq!(record.chain_id.as_deref(), Some("solana"));
        assert_eq!(record.min_followers, 10);
        assert_eq!(record.joined_after_sequence, 3);
    }

    #[test]
    fn test_update_unknown_subscriber() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.update_subscriber_filter(1, None, 0).unwrap());
        assert!(!db.reset_subscriber(1).unwrap());
        assert!(!db.delete_subscriber(1).unwrap());
    }

    #[test]
    fn test_delivered_set_is_per_subscriber() {
        let db = Database::open_in_memory().unwrap();
        db.insert_subscriber(1, 0).unwrap();
        db.insert_subscriber(2, 0).unwrap();

        assert!(db.mark_delivered(1, "A").unwrap());
        assert!(!db.mark_delivered(1, "A").unwrap());

        assert!(db.is_delivered(1, "A").unwrap());
        assert!(!db.is_delivered(2, "A").unwrap());
        assert_eq!(db.delivered_addresses(1).unwrap().len(), 1);
        assert_eq!(db.delivery_count(2).unwrap(), 0);
    }

    #[test]
    fn test_reset_clears_filter_and_deliveries() {
        let db = Database::open_in_memory().unwrap();
        db.insert_subscriber(1, 0).unwrap();
        db.update_subscriber_filter(1, Some("base"), 500).unwrap();
        db.mark_delivered(1, "A").unwrap();

        assert!(db.reset_subscriber(1).unwrap());
        let record = db.get_subscriber(1).unwrap().unwrap();
        assert_eq!(record.chain_id, None);
        assert_eq!(record.min_followers, 0);
        assert!(db.delivered_addresses(1).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_deliveries() {
        let db = Database::open_in_memory().unwrap();
        db.insert_subscriber(1, 0).unwrap();
        db.mark_delivered(1, "A").unwrap();

        assert!(db.delete_subscriber(1).unwrap());
        assert!(db.get_subscriber(1).unwrap().is_none());
        assert_eq!(db.delivery_count(1).unwrap(), 0);
    }

    #[test]
    fn test_watermark_only_advances() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_dispatch_watermark().unwrap(), 0);
        db.advance_dispatch_watermark(5).unwrap();
        db.advance_dispatch_watermark(3).unwrap();
        assert_eq!(db.get_dispatch_watermark().unwrap(), 5);
    }

    #[test]
    fn test_subscriber_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_subscriber(-100123, 0).unwrap();
            db.update_subscriber_filter(-100123, Some("solana"), 500).unwrap();
            db.mark_delivered(-100123, "A").unwrap();
            db.advance_dispatch_watermark(9).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let subscribers = db.list_subscribers().unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].chain_id.as_deref(), Some("solana"));
        assert!(db.is_delivered(-100123, "A").unwrap());
        assert_eq!(db.get_dispatch_watermark().unwrap(), 9);
    }
}
