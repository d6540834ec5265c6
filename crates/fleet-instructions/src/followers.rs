// SPDX-License-Identifier: Apache-2.0
//! Follower idleness tracking used by compaction (§4.D step 1, §4.E
//! eviction): who's known to the leader, who's mid-sync, and how to
//! force a straggler into a full resync.

use fleet_store::{keys, ClusterStore, StoreError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// How long `wait_for_followers_idle` polls before giving up on a
/// straggler (§5: 45s).
pub const WAIT_FOR_IDLE_TIMEOUT: Duration = Duration::from_secs(45);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const RESYNC_REASON: &str = "compaction-timeout";
const RESYNC_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Every node id the leader has observed via heartbeats, excluding
/// `exclude_node_id` (the leader's own id, which is tracked under the
/// same key space).
pub async fn active_followers<S: ClusterStore>(
    store: &S,
    exclude_node_id: &str,
) -> Result<Vec<String>, StoreError> {
    const PREFIX: &str = "cluster:known_nodes:";
    let found = store.keys_by_pattern(&keys::known_nodes_glob()).await?;
    Ok(found
        .into_iter()
        .filter_map(|key| key.strip_prefix(PREFIX).map(str::to_string))
        .filter(|node_id| node_id != exclude_node_id)
        .collect())
}

/// Poll every known follower's execution flag until none remain set or
/// `timeout` elapses. Returns the node ids still busy at the deadline —
/// the stragglers the caller (§4.D step 1) should evict.
pub async fn wait_for_followers_idle<S: ClusterStore>(
    store: &S,
    leader_node_id: &str,
    timeout: Duration,
) -> Vec<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let followers = active_followers(store, leader_node_id).await.unwrap_or_default();
        let mut busy = Vec::new();
        for follower in &followers {
            match store.get(&keys::execution_flag(follower)).await {
                Ok(Some(_)) => busy.push(follower.clone()),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(follower, error = %err, "failed to read execution flag, treating as idle");
                }
            }
        }
        if busy.is_empty() || Instant::now() >= deadline {
            return busy;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Force `node_id` out of its current sync attempt: clear its execution
/// flag and set its resync flag, so its next heartbeat resets it to
/// counter 0 and triggers a full replay (§4.D step 1, §4.E).
pub async fn kick_follower_for_resync<S: ClusterStore>(store: &S, node_id: &str) -> Result<(), StoreError> {
    store.del(&keys::execution_flag(node_id)).await?;
    store
        .set_ex(&keys::resync_required(node_id), RESYNC_REASON, RESYNC_TTL)
        .await
}
