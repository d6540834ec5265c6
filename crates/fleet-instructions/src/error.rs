// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the instruction log and manager (§7).

use fleet_proto::VersionParseError;
use fleet_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the instruction log and manager.
#[derive(Debug, Error)]
pub enum InstructionError {
    /// A store read or write exhausted its retry budget (§7). When this
    /// happens mid-compaction, the caller aborts the rewrite and rolls
    /// `leader_version` back to the pre-compaction counter.
    #[error("instruction store operation failed: {0}")]
    StoreExhausted(#[from] StoreError),
    /// An instruction or compaction marker couldn't be (de)serialized.
    #[error("instruction payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The persisted `cluster:leader_version` value was malformed.
    #[error("stored leader version is malformed: {0}")]
    MalformedVersion(#[from] VersionParseError),
    /// The publish worker task is no longer running to answer a request.
    #[error("instruction publish worker is no longer running")]
    WorkerGone,
}
