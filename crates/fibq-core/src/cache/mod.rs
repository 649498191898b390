//! Result cache interface and backends.
//!
//! The cache maps a stringified index to either the pending sentinel or the
//! decimal-encoded result. Writers follow a strict split: the gateway only
//! seeds absent entries with the sentinel, workers only write final values.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CoreError;

/// Snapshot of every cache entry, keyed by stringified index.
pub type CacheSnapshot = BTreeMap<String, String>;

/// Low-latency key-value store for pending and computed results.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    /// Store `value` under `key`, replacing what was there.
    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    /// Store `value` only when `key` has no entry. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, CoreError>;

    /// Every entry, including pending ones.
    async fn get_all(&self) -> Result<CacheSnapshot, CoreError>;
}
