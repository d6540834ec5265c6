// SPDX-License-Identifier: Apache-2.0
//! Wire-level data model for the cluster coordination core: the instruction
//! log entry format, the leader version string, heartbeats, and pending
//! (not-yet-published) changes.
//!
//! Every type here round-trips through `serde_json` and matches the
//! external schema documented for the shared key/value store.

pub mod heartbeat;
pub mod instruction;
pub mod pending_change;
pub mod sync_command;
pub mod version;

pub use heartbeat::Heartbeat;
pub use instruction::{
    CompactionClass, CompactionMarker, ComponentType, DeleteSentinel, Instruction, LogSlot, Metadata,
    Operation,
};
pub use pending_change::{ChangeKey, ChangeStatus, PendingChange};
pub use sync_command::{SyncAction, SyncCommand};
pub use version::{LeaderVersion, VersionParseError};
