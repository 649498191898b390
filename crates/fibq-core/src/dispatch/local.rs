// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process dispatch channel built on a tokio broadcast channel.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::warn;

use super::{DispatchChannel, Subscription};
use crate::error::CoreError;
use crate::job::DispatchMessage;

/// Default number of messages a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast dispatch within a single process.
///
/// A subscriber that falls more than `capacity` messages behind skips the
/// overwritten ones.
#[derive(Debug, Clone)]
pub struct LocalDispatch {
    channel: String,
    sender: broadcast::Sender<DispatchMessage>,
}

impl LocalDispatch {
    /// Create a channel named `channel` with the default capacity.
    pub fn new(channel: impl Into<String>) -> Self {
        Self::with_capacity(channel, DEFAULT_CAPACITY)
    }

    /// Create a channel with an explicit ring buffer size.
    pub fn with_capacity(channel: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            channel: channel.into(),
            sender,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl DispatchChannel for LocalDispatch {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, index: u32) -> Result<usize, CoreError> {
        let message = DispatchMessage::new(self.channel.clone(), index);
        // `send` only fails when nobody is subscribed; that is a lost message,
        // not an error.
        Ok(self.sender.send(message).unwrap_or(0))
    }

    async fn subscribe(&self) -> Result<Subscription, CoreError> {
        let mut receiver = self.sender.subscribe();
        let channel = self.channel.clone();

        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(message) => yield message,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel, skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        Ok(Subscription::new(stream.boxed()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_lost() {
        let dispatch = LocalDispatch::new("insert");
        assert_eq!(dispatch.publish(4).await.unwrap(), 0);

        // A late subscriber never sees the earlier message.
        let mut sub = dispatch.subscribe().await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(next.is_err(), "no replay expected");
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let dispatch = LocalDispatch::new("insert");
        let mut a = dispatch.subscribe().await.unwrap();
        let mut b = dispatch.subscribe().await.unwrap();

        assert_eq!(dispatch.publish(7).await.unwrap(), 2);

        let expected = DispatchMessage::new("insert", 7);
        assert_eq!(a.next().await, Some(expected.clone()));
        assert_eq!(b.next().await, Some(expected));
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_counting() {
        let dispatch = LocalDispatch::new("insert");
        let sub = dispatch.subscribe().await.unwrap();
        assert_eq!(dispatch.subscriber_count(), 1);
        drop(sub);
        assert_eq!(dispatch.subscriber_count(), 0);
        assert_eq!(dispatch.publish(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_overwritten_messages() {
        let dispatch = LocalDispatch::with_capacity("insert", 2);
        let mut sub = dispatch.subscribe().await.unwrap();

        for index in 0..5 {
            dispatch.publish(index).await.unwrap();
        }

        assert_eq!(sub.next().await.map(|m| m.index), Some(3));
        assert_eq!(sub.next().await.map(|m| m.index), Some(4));
    }
}
