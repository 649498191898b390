// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Redis-backed result cache.
//!
//! All entries live in a single Redis hash (default `values`), one field per
//! index. The connection manager reconnects transparently after a dropped
//! connection; commands issued while disconnected fail with an error.

use std::collections::HashMap;

use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;

use super::{CacheSnapshot, ResultCache};
use crate::error::CoreError;

/// Default name of the Redis hash holding the cache entries.
pub const DEFAULT_HASH_KEY: &str = "values";

/// Result cache stored in a Redis hash.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    hash_key: String,
}

impl RedisCache {
    /// Wrap an established connection manager.
    pub fn new(conn: ConnectionManager, hash_key: impl Into<String>) -> Self {
        Self {
            conn,
            hash_key: hash_key.into(),
        }
    }

    /// Connect to the Redis server behind `client`.
    pub async fn connect(
        client: ::redis::Client,
        hash_key: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CoreError::Cache {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;
        Ok(Self::new(conn, hash_key))
    }

    /// Name of the backing hash.
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let mut conn = self.conn.clone();
        conn.hget(&self.hash_key, key)
            .await
            .map_err(|e| CoreError::Cache {
                operation: "hget".to_string(),
                details: e.to_string(),
            })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(&self.hash_key, key, value)
            .await
            .map_err(|e| CoreError::CacheWrite {
                key: key.to_string(),
                details: e.to_string(),
            })
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, CoreError> {
        let mut conn = self.conn.clone();
        conn.hset_nx(&self.hash_key, key, value)
            .await
            .map_err(|e| CoreError::CacheWrite {
                key: key.to_string(),
                details: e.to_string(),
            })
    }

    async fn get_all(&self) -> Result<CacheSnapshot, CoreError> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, String> =
            conn.hgetall(&self.hash_key)
                .await
                .map_err(|e| CoreError::Cache {
                    operation: "hgetall".to_string(),
                    details: e.to_string(),
                })?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own hash so runs don't interfere.
    async fn test_cache(name: &str) -> Option<RedisCache> {
        let url = std::env::var("TEST_REDIS_URL").ok()?;
        let client = ::redis::Client::open(url).ok()?;
        let cache = RedisCache::connect(client, format!("fibq-test-{}", name))
            .await
            .ok()?;
        let mut conn = cache.conn.clone();
        conn.del::<_, ()>(cache.hash_key()).await.ok()?;
        Some(cache)
    }

    #[tokio::test]
    async fn test_hash_round_trip() {
        let Some(cache) = test_cache("round-trip").await else {
            eprintln!("Skipping test: TEST_REDIS_URL not set");
            return;
        };

        assert!(cache.set_if_absent("9", "Nothing yet!").await.unwrap());
        assert!(!cache.set_if_absent("9", "Nothing yet!").await.unwrap());
        cache.set("9", "55").await.unwrap();

        assert_eq!(cache.get("9").await.unwrap().as_deref(), Some("55"));
        assert_eq!(cache.get("10").await.unwrap(), None);

        let all = cache.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["9"], "55");
    }
}
