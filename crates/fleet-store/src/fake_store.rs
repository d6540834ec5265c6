// SPDX-License-Identifier: Apache-2.0
//! An in-memory `ClusterStore` for deterministic tests, with no Redis
//! dependency. Every other crate's test suite builds on this.

use crate::error::StoreError;
use crate::store::{ClusterStore, Subscription};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory stand-in for `ClusterStore`. Cheap to construct; safe to
/// share across tasks via `Arc`.
#[derive(Default)]
pub struct FakeStore {
    strings: Mutex<HashMap<String, StringEntry>>,
    lists: Mutex<HashMap<String, Vec<String>>>,
    zsets: Mutex<HashMap<String, Vec<(String, f64)>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl FakeStore {
    /// A fresh, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_sender(&self, name: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*').peekable();
    let mut rest = candidate;
    let anchored_start = !pattern.starts_with('*');
    let anchored_end = !pattern.ends_with('*');
    let mut first = true;
    while let Some(part) = parts.next() {
        if part.is_empty() {
            first = false;
            continue;
        }
        let is_last = parts.peek().is_none();
        if first && anchored_start {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if is_last && anchored_end {
            if !rest.ends_with(part) {
                return false;
            }
        } else if let Some(idx) = rest.find(part) {
            rest = &rest[idx + part.len()..];
        } else {
            return false;
        }
        first = false;
    }
    true
}

fn normalize_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len_i = len as isize;
    let clamp = |i: isize| -> isize {
        if i < 0 {
            (len_i + i).max(0)
        } else {
            i.min(len_i - 1)
        }
    };
    let start = clamp(start);
    let stop = clamp(stop);
    if start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(strings
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        strings.remove(key);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        if strings.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|d| now + d),
            },
        );
        Ok(true)
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let strings = self.strings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(strings
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .filter(|k| glob_match(pattern, k))
            .collect())
    }

    async fn lpush(&self, key: &str, value: &str, max_len: Option<usize>) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        let list = lists.entry(key.to_string()).or_default();
        list.insert(0, value.to_string());
        if let Some(max_len) = max_len {
            list.truncate(max_len);
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let Some((lo, hi)) = normalize_range(list.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(list[lo..=hi].to_vec())
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        Ok(lists.get(key).map_or(0, Vec::len))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut zsets = self.zsets.lock().unwrap_or_else(|e| e.into_inner());
        let set = zsets.entry(key.to_string()).or_default();
        set.retain(|(m, _)| m != member);
        set.push((member.to_string(), score));
        set.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let zsets = self.zsets.lock().unwrap_or_else(|e| e.into_inner());
        let Some(set) = zsets.get(key) else {
            return Ok(Vec::new());
        };
        let Some((lo, hi)) = normalize_range(set.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(set[lo..=hi].iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError> {
        let mut zsets = self.zsets.lock().unwrap_or_else(|e| e.into_inner());
        let Some(set) = zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|(_, score)| *score < min || *score > max);
        Ok((before - set.len()) as u64)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let sender = self.channel_sender(channel);
        let _ = sender.send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, StoreError> {
        let sender = self.channel_sender(channel);
        let mut broadcast_rx = sender.subscribe();
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        Ok(Subscription::new(rx))
    }
}
