// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the heartbeat protocol.

use fleet_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the heartbeat emitter and listener.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    /// A store operation failed (publish, subscribe, or known-nodes
    /// bookkeeping). Heartbeat errors are locally recovered (§7): the
    /// emitter and listener log and continue rather than propagate.
    #[error("heartbeat store operation failed: {0}")]
    Store(#[from] StoreError),
    /// A heartbeat or sync-command payload couldn't be (de)serialized.
    #[error("heartbeat payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}
