// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend handles shared by the gateway and workers.
//!
//! Connections are acquired once at startup, passed explicitly to whatever
//! needs them, and released by [`Backends::close`] at shutdown.

use std::sync::Arc;

use tracing::info;

use crate::cache::{MemoryCache, RedisCache, ResultCache};
use crate::config::Config;
use crate::dispatch::{DispatchChannel, LocalDispatch, RedisDispatch};
use crate::error::{CoreError, Result};
use crate::persistence::{self, DurableLog};

/// The three stores the pipeline runs on.
#[derive(Clone)]
pub struct Backends {
    /// Append-only submission log.
    pub log: Arc<dyn DurableLog>,
    /// Pending and computed results.
    pub cache: Arc<dyn ResultCache>,
    /// Gateway to worker notifications.
    pub dispatch: Arc<dyn DispatchChannel>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("channel", &self.dispatch.channel())
            .finish_non_exhaustive()
    }
}

impl Backends {
    /// Bundle existing handles.
    pub fn new(
        log: Arc<dyn DurableLog>,
        cache: Arc<dyn ResultCache>,
        dispatch: Arc<dyn DispatchChannel>,
    ) -> Self {
        Self {
            log,
            cache,
            dispatch,
        }
    }

    /// Connect to the database and Redis named in `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to durable log...");
        let log = persistence::connect(&config.database_url).await?;

        info!("Connecting to Redis...");
        let client = ::redis::Client::open(config.redis_url.as_str()).map_err(|e| {
            CoreError::Cache {
                operation: "connect".to_string(),
                details: e.to_string(),
            }
        })?;

        let cache = RedisCache::connect(client.clone(), config.cache_key.clone()).await?;
        let dispatch = RedisDispatch::connect(
            client,
            config.dispatch_channel.clone(),
            config.reconnect_interval,
        )
        .await?;

        info!(
            cache_key = %config.cache_key,
            channel = %config.dispatch_channel,
            "Backends connected"
        );

        Ok(Self::new(log, Arc::new(cache), Arc::new(dispatch)))
    }

    /// Single-process backends: in-memory SQLite, in-memory cache, and a
    /// broadcast channel named `channel`.
    pub async fn in_process(channel: &str) -> Result<Self> {
        let log = persistence::connect("sqlite::memory:").await?;
        Ok(Self::new(
            log,
            Arc::new(MemoryCache::new()),
            Arc::new(LocalDispatch::new(channel)),
        ))
    }

    /// Release pooled connections.
    pub async fn close(&self) {
        self.log.close().await;
        info!("Backends closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::DurableRecord;

    #[tokio::test]
    async fn test_in_process_backends() {
        let backends = Backends::in_process("insert").await.unwrap();
        assert_eq!(backends.dispatch.channel(), "insert");

        backends.log.append(DurableRecord::new(1)).await.unwrap();
        backends.cache.set("1", "1").await.unwrap();
        assert_eq!(backends.log.scan_all().await.unwrap().len(), 1);

        backends.close().await;
        assert!(backends.log.append(DurableRecord::new(2)).await.is_err());
    }
}
