// SPDX-License-Identifier: Apache-2.0
//! Follower heartbeat emission (§4.E, §5 task table): publishes a
//! heartbeat every `5s + rand(0..4s)` to desynchronise load across the
//! fleet, and checks for an outstanding resync flag on every tick.

use crate::metrics::SystemMetricsSource;
use crate::FollowerSyncState;
use fleet_proto::Heartbeat;
use fleet_store::{keys, ClusterStore};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

const BASE_INTERVAL: Duration = Duration::from_secs(5);
const JITTER_MAX_MILLIS: u64 = 4_000;

/// Static configuration for one node's heartbeat emitter.
pub struct EmitterConfig {
    /// This node's id.
    pub node_id: String,
}

/// Run the follower heartbeat loop until `stop` is notified. Each tick:
/// samples metrics, publishes a heartbeat carrying the follower's current
/// `(session, counter)`, then checks for a resync flag (§4.E follower
/// self-eviction) and clears/acts on it if present.
pub async fn run_emitter<S, F, M>(
    store: Arc<S>,
    sync_state: Arc<F>,
    metrics: Arc<M>,
    config: EmitterConfig,
    stop: Arc<Notify>,
) where
    S: ClusterStore,
    F: FollowerSyncState,
    M: SystemMetricsSource,
{
    loop {
        tokio::select! {
            () = stop.notified() => {
                tracing::info!(node_id = %config.node_id, "heartbeat emitter stopping");
                return;
            }
            () = tick(&*store, &*sync_state, &*metrics, &config) => {}
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=JITTER_MAX_MILLIS);
        sleep(BASE_INTERVAL + Duration::from_millis(jitter_ms)).await;
    }
}

async fn tick<S: ClusterStore, F: FollowerSyncState, M: SystemMetricsSource>(
    store: &S,
    sync_state: &F,
    metrics: &M,
    config: &EmitterConfig,
) {
    if let Err(err) = emit_once(store, sync_state, metrics, &config.node_id).await {
        tracing::warn!(node_id = %config.node_id, error = %err, "failed to emit heartbeat");
    }
    check_resync_flag(store, sync_state, &config.node_id).await;
}

async fn emit_once<S: ClusterStore, F: FollowerSyncState, M: SystemMetricsSource>(
    store: &S,
    sync_state: &F,
    metrics: &M,
    node_id: &str,
) -> Result<(), crate::HeartbeatError> {
    let sample = metrics.sample();
    let heartbeat = Heartbeat {
        node_id: node_id.to_string(),
        version: sync_state.current_version().await,
        timestamp: now_secs(),
        cpu_percent: sample.cpu_percent,
        mem_mb: sample.mem_mb,
        mem_percent: sample.mem_percent,
        goroutines: sample.goroutines,
    };
    let payload = serde_json::to_string(&heartbeat)?;
    store.publish(&keys::heartbeat_channel(), &payload).await?;
    Ok(())
}

async fn check_resync_flag<S: ClusterStore, F: FollowerSyncState>(store: &S, sync_state: &F, node_id: &str) {
    match store.get(&keys::resync_required(node_id)).await {
        Ok(Some(_)) => {
            tracing::info!(node_id, "resync flag observed, forcing full replay");
            if let Err(err) = store.del(&keys::resync_required(node_id)).await {
                tracing::warn!(node_id, error = %err, "failed to clear resync flag");
            }
            sync_state.force_resync().await;
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(node_id, error = %err, "failed to check resync flag"),
    }
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metrics::SystemMetrics;
    use fleet_proto::LeaderVersion;
    use fleet_store::FakeStore;
    use std::sync::Mutex;

    struct FixedSyncState {
        version: LeaderVersion,
        resynced: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl FollowerSyncState for FixedSyncState {
        async fn current_version(&self) -> LeaderVersion {
            self.version.clone()
        }
        async fn force_resync(&self) {
            *self.resynced.lock().unwrap() = true;
        }
    }

    struct ZeroMetrics;
    impl SystemMetricsSource for ZeroMetrics {
        fn sample(&self) -> SystemMetrics {
            SystemMetrics::default()
        }
    }

    #[tokio::test]
    async fn emits_a_heartbeat_carrying_the_current_version() {
        let store = FakeStore::new();
        let sync_state = FixedSyncState {
            version: LeaderVersion::new_session("sess1").with_counter(3),
            resynced: Mutex::new(false),
        };
        let mut sub = store.subscribe(&keys::heartbeat_channel()).await.unwrap();
        emit_once(&store, &sync_state, &ZeroMetrics, "node-a").await.unwrap();
        let payload = sub.recv().await.unwrap();
        let heartbeat: Heartbeat = serde_json::from_str(&payload).unwrap();
        assert_eq!(heartbeat.node_id, "node-a");
        assert_eq!(heartbeat.version.counter, 3);
    }

    #[tokio::test]
    async fn resync_flag_clears_itself_and_forces_a_resync() {
        let store = FakeStore::new();
        let sync_state = FixedSyncState {
            version: LeaderVersion::new_session("sess1"),
            resynced: Mutex::new(false),
        };
        store.set(&keys::resync_required("node-a"), "compaction-timeout").await.unwrap();
        check_resync_flag(&store, &sync_state, "node-a").await;
        assert!(*sync_state.resynced.lock().unwrap());
        assert!(store.get(&keys::resync_required("node-a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_resync_flag_is_a_no_op() {
        let store = FakeStore::new();
        let sync_state = FixedSyncState {
            version: LeaderVersion::new_session("sess1"),
            resynced: Mutex::new(false),
        };
        check_resync_flag(&store, &sync_state, "node-a").await;
        assert!(!*sync_state.resynced.lock().unwrap());
    }
}
