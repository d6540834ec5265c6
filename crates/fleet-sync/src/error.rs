// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the sync listener (§7).

use fleet_instructions::InstructionError;
use fleet_ports::{FactoryError, ProjectCommandError};
use fleet_proto::VersionParseError;
use fleet_store::StoreError;
use thiserror::Error;

/// Errors surfaced while replaying instructions onto a follower. Missing
/// instructions and apply failures both get the same treatment at the
/// call site: complete registry cleanup, counter reset, and a delayed
/// retry on the next sync command (§7).
#[derive(Debug, Error)]
pub enum SyncError {
    /// A store operation failed.
    #[error("sync store operation failed: {0}")]
    Store(#[from] StoreError),
    /// A heartbeat or instruction payload couldn't be (de)serialized.
    #[error("sync payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A leader version string couldn't be parsed.
    #[error("malformed leader version: {0}")]
    MalformedVersion(#[from] VersionParseError),
    /// The instruction log reported a permanent failure.
    #[error("instruction log error: {0}")]
    Instruction(#[from] InstructionError),
    /// A component factory rejected or failed to build a component.
    #[error("component factory error: {0}")]
    Factory(#[from] FactoryError),
    /// The project command handler reported a failure.
    #[error("project command failed: {0}")]
    ProjectCommand(#[from] ProjectCommandError),
    /// Phase 1 found one or more absent slots in `(local_counter, target_counter]`.
    #[error("missing instructions at versions {0:?}")]
    MissingInstructions(Vec<u64>),
    /// Phase 2 failed to apply the instruction at this version.
    #[error("failed to apply instruction at version {0}")]
    ApplyFailed(u64),
}
