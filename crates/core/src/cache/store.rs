//! Detail cache trait and types.

use std::collections::HashMap;

use thiserror::Error;

use crate::provider::PersonRecord;

/// Error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Aggregate statistics about the detail cache.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    /// Entries currently stored (including expired, pending purge).
    pub total_entries: i64,
    /// Entries whose expiry is still in the future.
    pub live_entries: i64,
}

/// Trait for the shared detail record cache.
///
/// The cache is global: it is shared read/write by every task and never
/// task-scoped. Writes are best-effort and commutative; a key already present
/// wins over a later write for the same key, since payloads for the same
/// external identity are treated as equivalent.
pub trait DetailCache: Send + Sync {
    /// Fetch all unexpired entries for the given keys.
    ///
    /// Absent or expired keys are simply omitted from the result, never an
    /// error. Returned records have `from_cache` set.
    fn get_many(&self, keys: &[String]) -> Result<HashMap<String, PersonRecord>, CacheError>;

    /// Store entries with the given time-to-live in days.
    ///
    /// Keys already present and unexpired are left untouched. Expired rows
    /// are overwritten by the fresh record.
    fn put_many(&self, entries: &[(String, PersonRecord)], ttl_days: i64)
        -> Result<(), CacheError>;

    /// Remove expired entries. Returns the number of rows removed.
    fn purge_expired(&self) -> Result<i64, CacheError>;

    /// Aggregate cache statistics.
    fn stats(&self) -> Result<CacheStats, CacheError>;
}
