// SPDX-License-Identifier: Apache-2.0
//! The heartbeat / version-gossip protocol between leader and followers
//! (§4.E): follower emission at a randomised interval, leader collection
//! with liveness tracking and drift-triggered sync commands, and
//! follower self-eviction on an observed resync flag.

mod emitter;
mod error;
mod listener;
mod metrics;
mod sweeper;

pub use emitter::{run_emitter, EmitterConfig};
pub use error::HeartbeatError;
pub use listener::{HeartbeatListener, HeartbeatState, KnownNode, NodeHealth};
pub use metrics::{SystemMetrics, SystemMetricsSource};
pub use sweeper::run_sweeper;

use async_trait::async_trait;
use fleet_proto::LeaderVersion;

/// The follower-side sync state the heartbeat emitter reports and the
/// resync hook it triggers (§4.E follower self-eviction). Implemented by
/// the sync listener's local state.
#[async_trait]
pub trait FollowerSyncState: Send + Sync {
    /// The `(session, counter)` this follower currently believes it has
    /// fully applied.
    async fn current_version(&self) -> LeaderVersion;

    /// Clear the registry, reset the local counter to 0 (keeping the
    /// current session placeholder), and let the next heartbeat trigger a
    /// full replay.
    async fn force_resync(&self);
}

/// The leader-side version source the heartbeat listener compares
/// incoming heartbeats against. Implemented by the instruction manager.
#[async_trait]
pub trait LeaderVersionSource: Send + Sync {
    /// The leader's current version.
    async fn current_version(&self) -> LeaderVersion;

    /// `true` while a publish is mid-compaction (§4.D); drift is not
    /// corrected while this holds, since the counter is transiently 0.
    fn is_compacting(&self) -> bool;
}
