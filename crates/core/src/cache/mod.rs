//! Search result caching.
//!
//! Two tiers share one key type:
//!
//! - [`CacheStore`]: in-process, capacity-bounded LRU with per-entry TTL.
//!   This tier is authoritative.
//! - [`CacheDb`]: optional SQLite tier via tokio-rusqlite that survives
//!   restarts on a best-effort basis.

pub mod connection;
pub mod hash;
pub mod key;
pub mod migrations;
pub mod search;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::content_fingerprint;
pub use key::{CacheKey, ttl_for_recency};
pub use search::StoredSearch;
pub use store::{CacheEntry, CacheStore, DocumentCache, SearchCache};
