// SPDX-License-Identifier: Apache-2.0
//! Leader-side heartbeat collection (§4.E): tracks the newest heartbeat
//! per node, persists a 48h-TTL `known_nodes` record, and nudges any
//! follower whose reported version drifts from the leader's onto a
//! targeted `sync` command.

use crate::LeaderVersionSource;
use fleet_proto::{Heartbeat, SyncAction, SyncCommand};
use fleet_store::{keys, ClusterStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

const KNOWN_NODE_TTL: Duration = Duration::from_secs(48 * 3600);

/// A node's health as judged from heartbeat age (§8): healthy under 10s,
/// not-healthy between 10s and the 60s eviction threshold the sweeper
/// enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    /// Heartbeat age under 10s.
    Healthy,
    /// Heartbeat age at least 10s but not yet evicted.
    NotHealthy,
}

/// The newest heartbeat seen from one node, plus when it arrived.
#[derive(Debug, Clone)]
pub struct KnownNode {
    /// The most recently received heartbeat.
    pub heartbeat: Heartbeat,
    /// When this heartbeat was recorded, for age-based health/eviction.
    pub last_seen: Instant,
}

/// Shared in-memory view of every node the leader has heard from.
/// Cheaply cloneable via `Arc`; the listener writes to it, the sweeper
/// reads and evicts from it, and a health endpoint can read it too.
#[derive(Debug, Default)]
pub struct HeartbeatState {
    nodes: Mutex<HashMap<String, KnownNode>>,
}

impl HeartbeatState {
    /// An empty state with no known nodes yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the newest heartbeat for its node.
    pub fn record(&self, heartbeat: Heartbeat) {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        nodes.insert(
            heartbeat.node_id.clone(),
            KnownNode {
                heartbeat,
                last_seen: Instant::now(),
            },
        );
    }

    /// Every node id currently tracked.
    #[must_use]
    pub fn known_node_ids(&self) -> Vec<String> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        nodes.keys().cloned().collect()
    }

    /// `(age, health)` for `node_id`, or `None` if it's never been seen.
    /// `health` is `NotHealthy` once the heartbeat is at least `healthy_for`
    /// old; callers pass the 10s boundary from §8.
    #[must_use]
    pub fn health_of(&self, node_id: &str, healthy_for: Duration) -> Option<(Duration, NodeHealth)> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        nodes.get(node_id).map(|known| {
            let age = known.last_seen.elapsed();
            let health = if age < healthy_for { NodeHealth::Healthy } else { NodeHealth::NotHealthy };
            (age, health)
        })
    }

    /// Remove and return every node whose heartbeat age exceeds
    /// `max_age`, for the offline sweeper (§4.E, §8).
    pub fn evict_older_than(&self, max_age: Duration) -> Vec<String> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let stale: Vec<String> = nodes
            .iter()
            .filter(|(_, known)| known.last_seen.elapsed() > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            nodes.remove(id);
        }
        stale
    }
}

/// Subscribes to `cluster:heartbeat`, updating `HeartbeatState` and the
/// persisted `known_nodes` record for every heartbeat received, and
/// publishing a targeted `sync` command when a follower's version has
/// drifted from the leader's.
pub struct HeartbeatListener<S, V> {
    store: Arc<S>,
    version_source: Arc<V>,
    state: Arc<HeartbeatState>,
}

impl<S: ClusterStore, V: LeaderVersionSource> HeartbeatListener<S, V> {
    /// Build a listener over a fresh `HeartbeatState`.
    #[must_use]
    pub fn new(store: Arc<S>, version_source: Arc<V>) -> Self {
        Self {
            store,
            version_source,
            state: Arc::new(HeartbeatState::new()),
        }
    }

    /// The shared state this listener writes to, for callers that need to
    /// read it concurrently (a health endpoint, the sweeper).
    #[must_use]
    pub fn state(&self) -> Arc<HeartbeatState> {
        Arc::clone(&self.state)
    }

    /// Run the subscribe loop until `stop` is notified or the
    /// subscription closes permanently.
    pub async fn run(&self, stop: Arc<Notify>) {
        let mut sub = match self.store.subscribe(&keys::heartbeat_channel()).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::error!(error = %err, "failed to subscribe to heartbeat channel");
                return;
            }
        };
        loop {
            tokio::select! {
                () = stop.notified() => {
                    tracing::info!("heartbeat listener stopping");
                    return;
                }
                msg = sub.recv() => {
                    match msg {
                        Some(payload) => self.handle_payload(&payload).await,
                        None => {
                            tracing::warn!("heartbeat subscription closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &str) {
        let heartbeat: Heartbeat = match serde_json::from_str(payload) {
            Ok(heartbeat) => heartbeat,
            Err(err) => {
                tracing::warn!(error = %err, "malformed heartbeat payload");
                return;
            }
        };
        self.state.record(heartbeat.clone());
        if let Err(err) = self
            .store
            .set_ex(&keys::known_nodes(&heartbeat.node_id), payload, KNOWN_NODE_TTL)
            .await
        {
            tracing::warn!(node_id = %heartbeat.node_id, error = %err, "failed to persist known node");
        }
        self.check_drift(&heartbeat).await;
    }

    async fn check_drift(&self, heartbeat: &Heartbeat) {
        if self.version_source.is_compacting() {
            return;
        }
        let leader_version = self.version_source.current_version().await;
        if heartbeat.version == leader_version {
            return;
        }
        let cmd = SyncCommand::targeted(SyncAction::Sync, leader_version, heartbeat.node_id.clone(), heartbeat.timestamp);
        match serde_json::to_string(&cmd) {
            Ok(payload) => {
                if let Err(err) = self.store.publish(&keys::sync_command_channel(), &payload).await {
                    tracing::warn!(node_id = %heartbeat.node_id, error = %err, "failed to publish sync command");
                }
            }
            Err(err) => tracing::warn!(node_id = %heartbeat.node_id, error = %err, "failed to encode sync command"),
        }
    }
}
