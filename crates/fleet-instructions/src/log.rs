// SPDX-License-Identifier: Apache-2.0
//! The instruction log (§4.C): one entry per version under
//! `cluster:instruction:<v>`, plus the leader version key. Every write
//! retries with capped exponential backoff (§7, 3 attempts/100ms base); a
//! permanent failure surfaces as `InstructionError::StoreExhausted` and
//! must never leave the log half-written — the instruction manager (§4.D)
//! is responsible for rolling back `leader_version` when that happens.

use crate::error::InstructionError;
use fleet_proto::{CompactionMarker, Instruction, LeaderVersion, LogSlot};
use fleet_store::backoff::{self, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use fleet_store::{keys, ClusterStore};
use std::sync::Arc;

/// Typed, retrying access to the instruction log held in the shared store.
pub struct InstructionLog<S> {
    store: Arc<S>,
}

impl<S: ClusterStore> InstructionLog<S> {
    /// Build a log over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Write `instruction` to its own version's slot.
    pub async fn append(&self, instruction: &Instruction) -> Result<(), InstructionError> {
        let payload = serde_json::to_string(instruction)?;
        self.write_slot(instruction.version, &payload).await
    }

    /// Overwrite `version`'s slot with a compaction marker.
    pub async fn write_marker(&self, version: u64) -> Result<(), InstructionError> {
        let payload = serde_json::to_string(&CompactionMarker::new())?;
        self.write_slot(version, &payload).await
    }

    async fn write_slot(&self, version: u64, payload: &str) -> Result<(), InstructionError> {
        let key = keys::instruction(version);
        let store = Arc::clone(&self.store);
        let payload = payload.to_string();
        backoff::retry(
            "instruction:write",
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            move || {
                let store = Arc::clone(&store);
                let key = key.clone();
                let payload = payload.clone();
                async move { store.set(&key, &payload).await }
            },
        )
        .await
        .map_err(InstructionError::StoreExhausted)
    }

    /// Read `version`'s slot: `None` if absent, `Some(LogSlot::Marker)` if
    /// compacted, `Some(LogSlot::Instruction)` otherwise.
    pub async fn get(&self, version: u64) -> Result<Option<LogSlot>, InstructionError> {
        let key = keys::instruction(version);
        let store = Arc::clone(&self.store);
        let raw = backoff::retry(
            "instruction:read",
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            move || {
                let store = Arc::clone(&store);
                let key = key.clone();
                async move { store.get(&key).await }
            },
        )
        .await
        .map_err(InstructionError::StoreExhausted)?;
        raw.map(|text| serde_json::from_str(&text).map_err(InstructionError::from))
            .transpose()
    }

    /// Read every slot in the inclusive range `[lo, hi]`, in order.
    pub async fn range(&self, lo: u64, hi: u64) -> Result<Vec<(u64, Option<LogSlot>)>, InstructionError> {
        let mut out = Vec::with_capacity(usize::try_from(hi.saturating_sub(lo) + 1).unwrap_or(0));
        for version in lo..=hi {
            out.push((version, self.get(version).await?));
        }
        Ok(out)
    }

    /// Delete `version`'s slot outright (used only at session teardown,
    /// §4.D boot initialisation).
    pub async fn delete(&self, version: u64) -> Result<(), InstructionError> {
        let key = keys::instruction(version);
        let store = Arc::clone(&self.store);
        backoff::retry(
            "instruction:delete",
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            move || {
                let store = Arc::clone(&store);
                let key = key.clone();
                async move { store.del(&key).await }
            },
        )
        .await
        .map_err(InstructionError::StoreExhausted)
    }

    /// Persist `version` as the current leader version.
    pub async fn set_leader_version(&self, version: &LeaderVersion) -> Result<(), InstructionError> {
        let key = keys::leader_version();
        let store = Arc::clone(&self.store);
        let value = version.to_string();
        backoff::retry(
            "leader_version:write",
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            move || {
                let store = Arc::clone(&store);
                let key = key.clone();
                let value = value.clone();
                async move { store.set(&key, &value).await }
            },
        )
        .await
        .map_err(InstructionError::StoreExhausted)
    }

    /// Read the current leader version, if one has ever been set.
    pub async fn get_leader_version(&self) -> Result<Option<LeaderVersion>, InstructionError> {
        let key = keys::leader_version();
        let store = Arc::clone(&self.store);
        let raw = backoff::retry(
            "leader_version:read",
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY,
            move || {
                let store = Arc::clone(&store);
                let key = key.clone();
                async move { store.get(&key).await }
            },
        )
        .await
        .map_err(InstructionError::StoreExhausted)?;
        raw.map(|text| text.parse().map_err(InstructionError::from)).transpose()
    }
}
