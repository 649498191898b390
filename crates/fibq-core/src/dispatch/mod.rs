//! Dispatch channel: broadcast notifications from the gateway to workers.
//!
//! Delivery is fan-out to every subscriber that is subscribed at publish
//! time. Nothing is persisted and nothing is replayed; a message published
//! with no subscriber is gone.

pub mod local;
pub mod redis;

pub use self::local::LocalDispatch;
pub use self::redis::RedisDispatch;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use futures::stream::BoxStream;

use crate::error::CoreError;
use crate::job::DispatchMessage;

/// Publish/subscribe bus carrying submitted indexes.
#[async_trait]
pub trait DispatchChannel: Send + Sync {
    /// Name of the channel messages are published on.
    fn channel(&self) -> &str;

    /// Publish `index`. Returns how many subscribers received it.
    async fn publish(&self, index: u32) -> Result<usize, CoreError>;

    /// Subscribe. Every message published after this returns is delivered
    /// to the subscription for as long as it is alive.
    async fn subscribe(&self) -> Result<Subscription, CoreError>;
}

/// A live subscription to a dispatch channel.
pub struct Subscription {
    inner: BoxStream<'static, DispatchMessage>,
}

impl Subscription {
    /// Wrap a message stream.
    pub fn new(inner: BoxStream<'static, DispatchMessage>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl Stream for Subscription {
    type Item = DispatchMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
