// SPDX-License-Identifier: Apache-2.0
//! The `cluster:sync_command` pub/sub message (§6): published by the
//! leader to tell followers either that a publish completed, or to sync
//! to a specific version.

use crate::version::LeaderVersion;
use serde::{Deserialize, Serialize};

/// What a sync command is telling followers to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// A publish (including a boot-time emission) just completed; any
    /// follower whose version differs from `leader_version` should sync.
    PublishComplete,
    /// Sync to `leader_version`, either every follower (`node_id` absent)
    /// or just the named one.
    Sync,
}

/// A message on the `cluster:sync_command` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCommand {
    /// What followers should do.
    pub action: SyncAction,
    /// The version to sync to.
    pub leader_version: LeaderVersion,
    /// If set, only this node should act; otherwise every follower should.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Monotonic seconds at publish time.
    pub timestamp: i64,
}

impl SyncCommand {
    /// A broadcast command (no `node_id`).
    #[must_use]
    pub fn broadcast(action: SyncAction, leader_version: LeaderVersion, timestamp: i64) -> Self {
        Self {
            action,
            leader_version,
            node_id: None,
            timestamp,
        }
    }

    /// A command targeted at a single follower.
    #[must_use]
    pub fn targeted(
        action: SyncAction,
        leader_version: LeaderVersion,
        node_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            action,
            leader_version,
            node_id: Some(node_id.into()),
            timestamp,
        }
    }

    /// `true` if this command applies to `node_id` — either a broadcast,
    /// or targeted at exactly this node. Messages whose `node_id` is set
    /// to a different node are ignored by the sync listener (§4.F).
    #[must_use]
    pub fn applies_to(&self, node_id: &str) -> bool {
        self.node_id.as_deref().is_none_or(|target| target == node_id)
    }
}
