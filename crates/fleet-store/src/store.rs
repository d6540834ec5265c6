// SPDX-License-Identifier: Apache-2.0
//! The `ClusterStore` port and the `Subscription` handle returned by
//! `subscribe`.

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// A live subscription to a pub/sub channel. Wraps a receiver so callers
/// never need to know whether the backing implementation is Redis or the
/// in-memory fake.
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    /// Wrap a receiver fed by the store implementation's background task.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Await the next published message, or `None` once the subscription
    /// is permanently closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Typed access to the remote key/value + pub/sub store the cluster
/// coordination core shares. Implementers hide the underlying product
/// (Redis, or an in-memory fake for tests) behind this trait so the rest
/// of the core is testable without a live backend.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a string value, or `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a string value with no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set a string value with a TTL.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete a key. Not an error if it was already absent.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically set `key` to `value` only if it's currently absent
    /// (optionally with a TTL). Returns `true` if the set happened. Used
    /// as the externally-held leader lock's building block and for other
    /// exclusion needs.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// All keys matching a glob `pattern` (e.g. `cluster:instruction:*`).
    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Push `value` onto the head of list `key`, trimming it to at most
    /// `max_len` entries if given.
    async fn lpush(&self, key: &str, value: &str, max_len: Option<usize>) -> Result<(), StoreError>;

    /// Read list `key` in the inclusive range `[start, stop]` (Redis
    /// `LRANGE` semantics: negative indices count from the tail).
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    /// Length of list `key`.
    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    /// Add `member` to sorted set `key` with `score`.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// Members of sorted set `key` in the inclusive rank range
    /// `[start, stop]`, ascending by score.
    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    /// Remove members of sorted set `key` with score in `[min, max]`.
    /// Returns the number removed.
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError>;

    /// Publish `payload` on `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError>;

    /// Subscribe to `channel`, returning a handle that yields published
    /// payloads until the subscription is dropped or permanently closed.
    /// Implementations reconnect transparently on connection loss.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError>;
}
