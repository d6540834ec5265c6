// SPDX-License-Identifier: Apache-2.0
//! The project lifecycle port (§4.I). The sync listener and instruction
//! manager hold only this trait object; the concrete project runtime is
//! out of scope for this crate.

use async_trait::async_trait;
use thiserror::Error;

/// A lifecycle action to perform on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    /// Start the project.
    Start,
    /// Stop the project.
    Stop,
    /// Stop then start the project.
    Restart,
}

/// Error performing a project lifecycle action.
#[derive(Debug, Error)]
pub enum ProjectCommandError {
    /// The named project isn't known to the project runtime.
    #[error("unknown project {0:?}")]
    UnknownProject(String),
    /// The runtime reported a failure executing the action.
    #[error("project {project:?} failed to {action:?}: {reason}")]
    ExecutionFailed {
        /// The project the action was attempted on.
        project: String,
        /// The action that was attempted.
        action: ProjectAction,
        /// A human-readable failure reason from the runtime.
        reason: String,
    },
}

/// Abstract port to start/stop/restart a running project instance.
#[async_trait]
pub trait ProjectCommandHandler: Send + Sync {
    /// Perform `action` on `project_id`. When `record_operation` is set,
    /// the implementation should record this as an operator-visible
    /// operation in its own history (out of scope here beyond the flag).
    async fn execute(
        &self,
        project_id: &str,
        action: ProjectAction,
        record_operation: bool,
    ) -> Result<(), ProjectCommandError>;
}
