//! Durable search result tier.
//!
//! Rows are keyed by [`CacheKey::digest`] and carry an RFC 3339 expiry.
//! Reads only ever return rows that have not yet expired.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

use super::connection::CacheDb;
use super::key::CacheKey;
use crate::Error;
use crate::time::{FAR_FUTURE, whole_seconds};
use crate::types::ProviderResult;

/// A fresh row from the durable tier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSearch {
    pub results: Vec<ProviderResult>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSearch {
    /// Time left before expiry, zero once expired.
    pub fn remaining_ttl(&self) -> std::time::Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or_default()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("bad cache timestamp {raw:?}: {e}")))
}

impl CacheDb {
    /// Get fresh cached results for `key`.
    ///
    /// Returns None if the key is absent or its row has expired.
    pub async fn get_search(&self, key: &CacheKey) -> Result<Option<StoredSearch>, Error> {
        let key_hash = key.digest();
        let now = timestamp(Utc::now());

        let row = self
            .conn
            .call(move |conn| -> Result<Option<(String, String, String)>, Error> {
                let row = conn
                    .query_row(
                        "SELECT results_json, fetched_at, expires_at FROM search_cache
                         WHERE key_hash = ?1 AND expires_at > ?2",
                        params![key_hash, now],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        let Some((results_json, fetched_at, expires_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredSearch {
            results: serde_json::from_str(&results_json)?,
            fetched_at: parse_timestamp(&fetched_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        }))
    }

    /// Insert or update cached results for `key`.
    ///
    /// Uses UPSERT semantics: a second write for the same key replaces the
    /// results and restarts the TTL.
    pub async fn put_search(&self, key: &CacheKey, results: &[ProviderResult], ttl_seconds: i64) -> Result<(), Error> {
        let key_hash = key.digest();
        let provider_id = key.provider_id.to_string();
        let query = key.normalized_query.clone();
        let results_json = serde_json::to_string(results)?;

        let fetched = Utc::now();
        let fetched_at = timestamp(fetched);
        let limit = whole_seconds(FAR_FUTURE);
        let ttl = Duration::seconds(ttl_seconds.clamp(-limit, limit));
        let expires_at = timestamp(fetched + ttl);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO search_cache (key_hash, provider_id, query, results_json, fetched_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        results_json = excluded.results_json,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at",
                    params![key_hash, provider_id, query, results_json, fetched_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired rows, returning how many were removed.
    pub async fn purge_expired_search(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM search_cache WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
