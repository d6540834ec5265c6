// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the pending change manager (§7).

use fleet_instructions::InstructionError;
use fleet_ports::FactoryError;
use fleet_proto::ChangeKey;
use thiserror::Error;

/// Errors surfaced by the pending change manager.
#[derive(Debug, Error)]
pub enum PendingChangeError {
    /// No pending change is tracked at this key.
    #[error("no pending change tracked for {0:?}")]
    NotFound(ChangeKey),
    /// `ApplySingle` was called on a change that hasn't reached `verified`.
    #[error("pending change {0:?} is not verified")]
    NotVerified(ChangeKey),
    /// Verification against the component factory failed.
    #[error("verification failed: {0}")]
    Verification(#[from] FactoryError),
    /// Publishing the change through the instruction manager failed.
    #[error("publish failed: {0}")]
    Instruction(#[from] InstructionError),
}
