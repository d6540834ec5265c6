// SPDX-License-Identifier: Apache-2.0
//! The follower sync listener (§4.F): replays leader instructions onto
//! the local component registry via the two-phase `SyncInstructions`
//! algorithm, with a complete cleanup procedure for session changes,
//! corruption, and unrecoverable apply failures.

mod apply;
mod cleanup;
mod error;
mod listener;
mod state;

pub use cleanup::cleanup_all;
pub use error::SyncError;
pub use fleet_ports::ComponentFactories;
pub use listener::{sync_instructions, SyncListener};
pub use state::FollowerState;
