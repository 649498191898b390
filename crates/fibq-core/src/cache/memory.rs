// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process result cache for embedded deployments and tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheSnapshot, ResultCache};
use crate::error::CoreError;

/// Result cache held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<CacheSnapshot>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, CoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get_all(&self) -> Result<CacheSnapshot, CoreError> {
        Ok(self.entries.read().await.clone())
    }
}
