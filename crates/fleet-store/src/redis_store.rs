// SPDX-License-Identifier: Apache-2.0
//! The Redis-backed `ClusterStore`. Built on `redis`'s auto-reconnecting
//! `ConnectionManager` for ordinary commands, and a dedicated `PubSub`
//! connection per subscription with its own reconnect loop.

use crate::error::StoreError;
use crate::store::{ClusterStore, Subscription};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::mpsc;

/// Base delay between pub/sub reconnect attempts.
const SUBSCRIBE_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// A `ClusterStore` backed by a live Redis (or Redis-compatible) server.
pub struct RedisStore {
    client: redis::Client,
    manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379/0`), acquiring
    /// an auto-reconnecting multiplexed connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl ClusterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.manager.clone();
        let value: Option<String> = con.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.set(key, value).await?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.del(key).await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut con = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        let result: Option<String> = cmd.query_async(&mut con).await?;
        Ok(result.is_some())
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut con = self.manager.clone();
        let keys: Vec<String> = con.keys(pattern).await?;
        Ok(keys)
    }

    async fn lpush(&self, key: &str, value: &str, max_len: Option<usize>) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.lpush(key, value).await?;
        if let Some(max_len) = max_len {
            if max_len > 0 {
                con.ltrim(key, 0, max_len as isize - 1).await?;
            }
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut con = self.manager.clone();
        let values: Vec<String> = con.lrange(key, start, stop).await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut con = self.manager.clone();
        let len: usize = con.llen(key).await?;
        Ok(len)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut con = self.manager.clone();
        let values: Vec<String> = con.zrange(key, start, stop).await?;
        Ok(values)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError> {
        let mut con = self.manager.clone();
        let removed: u64 = con.zrembyscore(key, min, max).await?;
        Ok(removed)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut con = self.manager.clone();
        con.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let client = self.client.clone();
        let channel = channel.to_string();
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(async move {
            loop {
                match client.get_async_pubsub().await {
                    Ok(mut pubsub) => {
                        if let Err(err) = pubsub.subscribe(&channel).await {
                            tracing::warn!(%channel, error = %err, "pubsub subscribe failed, retrying");
                        } else {
                            let mut stream = pubsub.into_on_message();
                            while let Some(msg) = stream.next().await {
                                let Ok(payload) = msg.get_payload::<String>() else {
                                    continue;
                                };
                                if tx.send(payload).await.is_err() {
                                    return;
                                }
                            }
                            tracing::warn!(%channel, "pubsub stream ended, reconnecting");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%channel, error = %err, "failed to open pubsub connection, retrying");
                    }
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(SUBSCRIBE_RECONNECT_DELAY).await;
            }
        });

        Ok(Subscription::new(rx))
    }
}
