//! SQLite-backed detail cache implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::{CacheError, CacheStats, DetailCache};
use crate::provider::PersonRecord;

/// SQLite-backed detail cache.
pub struct SqliteDetailCache {
    conn: Mutex<Connection>,
}

impl SqliteDetailCache {
    /// Create a new SQLite cache, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite cache (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS detail_cache (
                link TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_detail_cache_expires ON detail_cache(expires_at);
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }
}

impl DetailCache for SqliteDetailCache {
    fn get_many(&self, keys: &[String]) -> Result<HashMap<String, PersonRecord>, CacheError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let mut stmt = conn
            .prepare("SELECT record FROM detail_cache WHERE link = ? AND expires_at > ?")
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let mut hits = HashMap::new();
        for key in keys {
            let row: Option<String> = stmt
                .query_row(params![key, now], |row| row.get(0))
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    e => Err(CacheError::Database(e.to_string())),
                })?;

            if let Some(json) = row {
                // A corrupt payload is treated as a miss, not an error.
                if let Ok(mut record) = serde_json::from_str::<PersonRecord>(&json) {
                    record.from_cache = true;
                    hits.insert(key.clone(), record);
                }
            }
        }

        Ok(hits)
    }

    fn put_many(
        &self,
        entries: &[(String, PersonRecord)],
        ttl_days: i64,
    ) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let expires_at = now + Duration::days(ttl_days);

        let tx = conn
            .transaction()
            .map_err(|e| CacheError::Database(e.to_string()))?;

        for (link, record) in entries {
            let json = serde_json::to_string(record)
                .map_err(|e| CacheError::Database(e.to_string()))?;

            // First writer wins for live entries; expired rows get replaced.
            tx.execute(
                "INSERT INTO detail_cache (link, record, created_at, expires_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(link) DO UPDATE SET
                     record = excluded.record,
                     created_at = excluded.created_at,
                     expires_at = excluded.expires_at
                 WHERE detail_cache.expires_at <= ?",
                params![
                    link,
                    json,
                    now.to_rfc3339(),
                    expires_at.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;
        }

        tx.commit().map_err(|e| CacheError::Database(e.to_string()))
    }

    fn purge_expired(&self) -> Result<i64, CacheError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute(
                "DELETE FROM detail_cache WHERE expires_at <= ?",
                params![Utc::now().to_rfc3339()],
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(removed as i64)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn.lock().unwrap();

        let total_entries: i64 = conn
            .query_row("SELECT COUNT(*) FROM detail_cache", [], |row| row.get(0))
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let live_entries: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM detail_cache WHERE expires_at > ?",
                params![Utc::now().to_rfc3339()],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(CacheStats {
            total_entries,
            live_entries,
        })
    }
}

impl SqliteDetailCache {
    /// Insert an entry with an explicit expiry (test hook for expired rows).
    #[doc(hidden)]
    pub fn put_with_expiry(
        &self,
        link: &str,
        record: &PersonRecord,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(record).map_err(|e| CacheError::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO detail_cache (link, record, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
            params![
                link,
                json,
                Utc::now().to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }
}
