// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Redis pub/sub dispatch channel.
//!
//! Publishing goes through a shared connection manager. Each subscription
//! owns a dedicated pub/sub connection; when it drops, the subscription
//! reconnects at a fixed interval until it succeeds. Messages published
//! while a subscription is disconnected are never seen by it.

use std::time::Duration;

use ::redis::AsyncCommands;
use ::redis::aio::{ConnectionManager, PubSub};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::{DispatchChannel, Subscription};
use crate::error::CoreError;
use crate::job::DispatchMessage;

/// Default delay between subscriber reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Dispatch channel backed by Redis `PUBLISH`/`SUBSCRIBE`.
#[derive(Clone)]
pub struct RedisDispatch {
    client: ::redis::Client,
    publisher: ConnectionManager,
    channel: String,
    reconnect_interval: Duration,
}

impl RedisDispatch {
    /// Connect the publisher side. Subscriptions open their own connections.
    pub async fn connect(
        client: ::redis::Client,
        channel: impl Into<String>,
        reconnect_interval: Duration,
    ) -> Result<Self, CoreError> {
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| CoreError::Dispatch {
                operation: "connect".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            publisher,
            channel: channel.into(),
            reconnect_interval,
        })
    }
}

async fn open_subscription(client: &::redis::Client, channel: &str) -> Result<PubSub, CoreError> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| CoreError::Dispatch {
            operation: "subscribe".to_string(),
            details: e.to_string(),
        })?;

    pubsub
        .subscribe(channel)
        .await
        .map_err(|e| CoreError::Dispatch {
            operation: "subscribe".to_string(),
            details: e.to_string(),
        })?;

    Ok(pubsub)
}

#[async_trait]
impl DispatchChannel for RedisDispatch {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, index: u32) -> Result<usize, CoreError> {
        let mut conn = self.publisher.clone();
        let message = DispatchMessage::new(self.channel.clone(), index);
        let receivers: i64 = conn
            .publish(&self.channel, message.payload())
            .await
            .map_err(|e| CoreError::Dispatch {
                operation: "publish".to_string(),
                details: e.to_string(),
            })?;

        Ok(receivers.max(0) as usize)
    }

    async fn subscribe(&self) -> Result<Subscription, CoreError> {
        // The first subscription is made before returning so that no publish
        // after this call can be missed while connecting.
        let mut pubsub = open_subscription(&self.client, &self.channel).await?;
        let client = self.client.clone();
        let channel = self.channel.clone();
        let interval = self.reconnect_interval;

        info!(channel = %channel, "Subscribed to dispatch channel");

        let stream = async_stream::stream! {
            loop {
                {
                    let mut messages = pubsub.on_message();
                    while let Some(msg) = messages.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(channel = %channel, error = %e, "Unreadable dispatch payload");
                                continue;
                            }
                        };
                        match DispatchMessage::from_payload(msg.get_channel_name(), &payload) {
                            Ok(message) => yield message,
                            Err(e) => warn!(error = %e, "Skipping malformed dispatch message"),
                        }
                    }
                }

                warn!(
                    channel = %channel,
                    retry_in_ms = interval.as_millis() as u64,
                    "Dispatch subscription lost, reconnecting"
                );

                pubsub = loop {
                    tokio::time::sleep(interval).await;
                    match open_subscription(&client, &channel).await {
                        Ok(pubsub) => break pubsub,
                        Err(e) => debug!(channel = %channel, error = %e, "Reconnect attempt failed"),
                    }
                };

                info!(channel = %channel, "Dispatch subscription restored");
            }
        };

        Ok(Subscription::new(stream.boxed()))
    }
}
