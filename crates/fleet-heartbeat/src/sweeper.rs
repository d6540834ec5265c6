// SPDX-License-Identifier: Apache-2.0
//! The offline sweeper (§4.E, §8): every 10s, evicts any node whose last
//! heartbeat is older than 60s. Between 10s and 60s a node is reported
//! not-healthy but stays tracked.

use crate::listener::HeartbeatState;
use fleet_store::{keys, ClusterStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const EVICTION_AGE: Duration = Duration::from_secs(60);

/// Run the sweep loop until `stop` is notified. Each tick evicts stale
/// nodes from `state` and best-effort clears their persisted
/// `known_nodes` record.
pub async fn run_sweeper<S: ClusterStore>(store: Arc<S>, state: Arc<HeartbeatState>, stop: Arc<Notify>) {
    loop {
        tokio::select! {
            () = stop.notified() => {
                tracing::info!("offline sweeper stopping");
                return;
            }
            () = sleep(SWEEP_INTERVAL) => {}
        }
        sweep_once(&*store, &state, EVICTION_AGE).await;
    }
}

async fn sweep_once<S: ClusterStore>(store: &S, state: &HeartbeatState, max_age: Duration) {
    let evicted = state.evict_older_than(max_age);
    for node_id in evicted {
        tracing::info!(node_id = %node_id, "evicting offline node");
        if let Err(err) = store.del(&keys::known_nodes(&node_id)).await {
            tracing::warn!(node_id = %node_id, error = %err, "failed to clear known node record on eviction");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fleet_proto::{Heartbeat, LeaderVersion};
    use fleet_store::FakeStore;

    fn heartbeat(node_id: &str) -> Heartbeat {
        Heartbeat::new(node_id, LeaderVersion::new_session("sess1"), 1, 0.0, 0.0, 0.0, 0)
    }

    #[tokio::test]
    async fn sweep_once_clears_the_known_nodes_record_for_every_eviction() {
        let store = FakeStore::new();
        store.set_ex(&keys::known_nodes("node-a"), "x", Duration::from_secs(3600)).await.unwrap();
        let state = HeartbeatState::new();
        state.record(heartbeat("node-a"));

        sweep_once(&store, &state, Duration::from_secs(0)).await;
        assert!(state.known_node_ids().is_empty());
        assert!(store.get(&keys::known_nodes("node-a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_nodes_survive_a_sweep() {
        let store = FakeStore::new();
        let state = HeartbeatState::new();
        state.record(heartbeat("node-a"));
        sweep_once(&store, &state, EVICTION_AGE).await;
        assert_eq!(state.known_node_ids(), vec!["node-a".to_string()]);
    }
}
