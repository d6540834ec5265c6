// SPDX-License-Identifier: Apache-2.0
//! The heartbeat a follower publishes on `cluster:heartbeat`.

use crate::version::LeaderVersion;
use serde::{Deserialize, Serialize};

/// A follower's liveness/version report, published on `cluster:heartbeat`
/// at a randomised interval (see `fleet-heartbeat`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// The reporting node's id.
    pub node_id: String,
    /// The node's current `(session, counter)`.
    pub version: LeaderVersion,
    /// Monotonic seconds at emission time.
    pub timestamp: i64,
    /// CPU utilisation, percent.
    pub cpu_percent: f32,
    /// Resident memory, megabytes.
    pub mem_mb: f32,
    /// Memory utilisation, percent.
    pub mem_percent: f32,
    /// Number of concurrently running async tasks on this node. Kept
    /// under the historical `goroutines` wire name for schema continuity.
    pub goroutines: u32,
}

impl Heartbeat {
    /// Build a heartbeat for `node_id` reporting `version` at `timestamp`,
    /// with the given sampled system metrics.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        version: LeaderVersion,
        timestamp: i64,
        cpu_percent: f32,
        mem_mb: f32,
        mem_percent: f32,
        goroutines: u32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            version,
            timestamp,
            cpu_percent,
            mem_mb,
            mem_percent,
            goroutines,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let hb = Heartbeat::new("node-1", LeaderVersion::new_session("abcd1234"), 42, 1.5, 128.0, 3.2, 9);
        let json = serde_json::to_string(&hb).unwrap();
        let back: Heartbeat = serde_json::from_str(&json).unwrap();
        assert_eq!(hb, back);
    }
}
