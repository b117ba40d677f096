//! SQLite persistence
//!
//! One `Database` backs the TokenLog, subscriber filters, per-subscriber
//! delivered sets and the dispatch watermark. Queries are split by concern
//! into `impl Database` blocks in the sibling files.

pub mod subscribers;
pub mod token_log;

pub use subscribers::SubscriberRecord;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::Connection;
use std::path::Path;

use crate::logger::{self, LogTag};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tokens (
        sequence INTEGER PRIMARY KEY AUTOINCREMENT,
        token_address TEXT NOT NULL UNIQUE,
        chain_id TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        links_json TEXT NOT NULL DEFAULT '[]',
        website_url TEXT,
        twitter_url TEXT,
        twitter_followers INTEGER NOT NULL DEFAULT 0,
        telegram_url TEXT,
        telegram_members INTEGER NOT NULL DEFAULT 0,
        discovered_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tokens_chain_id ON tokens(chain_id);

    CREATE TABLE IF NOT EXISTS subscribers (
        id INTEGER PRIMARY KEY,
        chain_id TEXT,
        min_followers INTEGER NOT NULL DEFAULT 0,
        joined_after_sequence INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS deliveries (
        subscriber_id INTEGER NOT NULL,
        token_address TEXT NOT NULL,
        delivered_at TEXT NOT NULL,
        PRIMARY KEY (subscriber_id, token_address)
    );

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    );
";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL journal")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous mode")?;

        let db = Self::from_connection(conn)?;
        logger::info(
            LogTag::Storage,
            &format!(
                "Database ready at {} ({} tokens logged)",
                path.display(),
                db.token_count()?
            ),
        );
        Ok(db)
    }

    /// Throwaway database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Raw SQL against the live connection, for tests that break the schema
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(sql)
    }
}

pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub(crate) fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scout.db");

        let db = Database::open(&path).unwrap();
        assert_eq!(db.token_count().unwrap(), 0);
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.token_count().unwrap(), 0);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(0, &format_timestamp(&now)).unwrap();
        assert_eq!(parsed, now);
        assert!(parse_timestamp(0, "yesterday").is_err());
    }
}
