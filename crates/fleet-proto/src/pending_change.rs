// SPDX-License-Identifier: Apache-2.0
//! Pending (not-yet-published) operator edits, tracked by the pending
//! change manager ahead of verification and atomic publish.

use crate::instruction::ComponentType;
use serde::{Deserialize, Serialize};

/// Identifies a pending change: the component type and its stable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeKey {
    /// The kind of component being edited.
    pub component_type: ComponentType,
    /// The component's stable identifier.
    pub id: String,
}

impl ChangeKey {
    /// Build a key for `(component_type, id)`.
    #[must_use]
    pub fn new(component_type: ComponentType, id: impl Into<String>) -> Self {
        Self {
            component_type,
            id: id.into(),
        }
    }
}

/// Where a pending change sits in its verify/apply lifecycle.
///
/// `draft -> verified -> applied` is the success path; `draft -> invalid`
/// is a failed verify; `verified|applied -> failed` is a failed apply.
/// Terminal states (`invalid`, `applied`, `failed`) can be overwritten by a
/// new `AddChange` on the same key, which resets to `draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Freshly submitted, not yet verified.
    Draft,
    /// Verification succeeded; ready to publish.
    Verified,
    /// Verification failed; will never be published as-is.
    Invalid,
    /// Successfully published through the instruction log.
    Applied,
    /// Publish was attempted and failed.
    Failed,
}

/// An operator-proposed edit not yet published through the instruction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// The component type and id this change targets.
    pub key: ChangeKey,
    /// `true` if this change creates a new component rather than editing
    /// an existing one.
    pub is_new: bool,
    /// The content before this change (empty/absent for new components).
    pub old_content: Option<String>,
    /// The content this change proposes.
    pub new_content: String,
    /// Current lifecycle status.
    pub status: ChangeStatus,
    /// The verification or apply error, if `status` is `invalid` or
    /// `failed`.
    pub error: Option<String>,
    /// Monotonic seconds of the last status transition.
    pub last_updated: i64,
    /// Monotonic seconds of a successful verification, if any.
    pub verified_at: Option<i64>,
}

impl PendingChange {
    /// A freshly drafted change at `now`.
    #[must_use]
    pub fn draft(
        key: ChangeKey,
        new_content: impl Into<String>,
        old_content: Option<String>,
        is_new: bool,
        now: i64,
    ) -> Self {
        Self {
            key,
            is_new,
            old_content,
            new_content: new_content.into(),
            status: ChangeStatus::Draft,
            error: None,
            last_updated: now,
            verified_at: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn draft_starts_with_no_error_and_no_verified_at() {
        let change = PendingChange::draft(
            ChangeKey::new(ComponentType::Ruleset, "r1"),
            "content",
            None,
            true,
            100,
        );
        assert_eq!(change.status, ChangeStatus::Draft);
        assert!(change.error.is_none());
        assert!(change.verified_at.is_none());
    }

    #[test]
    fn key_round_trips_through_json() {
        let key = ChangeKey::new(ComponentType::Plugin, "p1");
        let json = serde_json::to_string(&key).unwrap();
        let back: ChangeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
