// SPDX-License-Identifier: Apache-2.0
//! The pending change manager (§4.G): an authoritative in-memory map of
//! operator edits not yet published, their verify/apply state machine,
//! and the batch apply path that submits verified changes through the
//! instruction manager.

mod error;
mod manager;

pub use error::PendingChangeError;
pub use manager::{ApplyOutcome, ApplySummary, PendingChangeManager};

use thiserror::Error;

/// The on-disk scratch-file representation a pending change may be
/// mirrored to, out of scope for this crate beyond this seam (§4.G
/// cancellation cleanup). Implementations are free to no-op.
pub trait ScratchStore: Send + Sync {
    /// Remove any on-disk representation of `key`. Best-effort: an
    /// absent file is not an error.
    fn remove(&self, key: &fleet_proto::ChangeKey) -> Result<(), ScratchError>;
}

/// Error removing a pending change's scratch representation.
#[derive(Debug, Error)]
pub enum ScratchError {
    /// I/O error while removing the file.
    #[error("scratch store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A `ScratchStore` that does nothing, for nodes that don't mirror
/// pending changes to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScratchStore;

impl ScratchStore for NullScratchStore {
    fn remove(&self, _key: &fleet_proto::ChangeKey) -> Result<(), ScratchError> {
        Ok(())
    }
}
