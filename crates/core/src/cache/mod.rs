//! Shared detail record cache with TTL expiry.

mod sqlite;
mod store;

pub use sqlite::SqliteDetailCache;
pub use store::{CacheError, CacheStats, DetailCache};
