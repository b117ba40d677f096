//! TokenLog: append-only, address-keyed record of every discovered token

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database};
use crate::profiles::{EnrichedToken, Link, TokenEnrichment};

const TOKEN_COLUMNS: &str = "sequence, token_address, chain_id, description, links_json, \
     website_url, twitter_url, twitter_followers, telegram_url, telegram_members, discovered_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<EnrichedToken> {
    let links_json: String = row.get(4)?;
    let links: Vec<Link> = serde_json::from_str(&links_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let discovered_at: String = row.get(10)?;

    Ok(EnrichedToken {
        discovery_sequence: row.get(0)?,
        token_address: row.get(1)?,
        chain_id: row.get(2)?,
        description: row.get(3)?,
        links,
        website_url: row.get(5)?,
        twitter_url: row.get(6)?,
        twitter_followers: row.get(7)?,
        telegram_url: row.get(8)?,
        telegram_members: row.get(9)?,
        discovered_at: parse_timestamp(10, &discovered_at)?,
    })
}

impl Database {
    /// Whether `token_address` is already in the TokenLog
    pub fn contains_token(&self, token_address: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM tokens WHERE token_address = ?1",
                params![token_address],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Durably append an enriched token and assign its discovery sequence
    ///
    /// Returns `None` when the address is already logged; the existing entry
    /// is left untouched.
    pub fn append_token(&self, enrichment: TokenEnrichment) -> Result<Option<EnrichedToken>> {
        let discovered_at = Utc::now();
        let links_json = serde_json::to_string(&enrichment.profile.links)
            .context("Failed to encode token links")?;

        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT INTO tokens (
                    token_address, chain_id, description, links_json, website_url,
                    twitter_url, twitter_followers, telegram_url, telegram_members, discovered_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(token_address) DO NOTHING",
                params![
                    enrichment.profile.token_address,
                    enrichment.profile.chain_id,
                    enrichment.profile.description,
                    links_json,
                    enrichment.website_url,
                    enrichment.twitter_url,
                    enrichment.twitter_followers,
                    enrichment.telegram_url,
                    enrichment.telegram_members,
                    format_timestamp(&discovered_at),
                ],
            )
            .with_context(|| {
                format!("Failed to append token {}", enrichment.profile.token_address)
            })?;

        if inserted == 0 {
            return Ok(None);
        }

        let sequence = conn.last_insert_rowid() as u64;
        Ok(Some(EnrichedToken::from_enrichment(
            enrichment,
            sequence,
            discovered_at,
        )))
    }

    /// Entire log in discovery order
    pub fn tokens_ordered(&self) -> Result<Vec<EnrichedToken>> {
        self.tokens_after(0)
    }

    /// Entries with `discovery_sequence > sequence`, in discovery order
    pub fn tokens_after(&self, sequence: u64) -> Result<Vec<EnrichedToken>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM tokens WHERE sequence > ?1 ORDER BY sequence ASC",
            TOKEN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![sequence], token_from_row)?;

        let mut tokens = Vec::new();
        for token in rows {
            tokens.push(token?);
        }
        Ok(tokens)
    }

    pub fn token_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM tokens", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Highest assigned discovery sequence, `0` for an empty log
    pub fn latest_sequence(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let latest: u64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) FROM tokens",
            [],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// Distinct chain ids seen so far, sorted
    pub fn known_chains(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT chain_id FROM tokens ORDER BY chain_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut chains = Vec::new();
        for chain in rows {
            chains.push(chain?);
        }
        Ok(chains)
    }
}
