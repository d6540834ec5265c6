// SPDX-License-Identifier: Apache-2.0
//! The pending change manager's state machine and batch-apply path
//! (§4.G). `ApplySingle`/`ApplyAll` submit a verified change as a
//! `push_change` instruction through the instruction manager, tagged
//! `source: "change_push"`, then restart the union of affected projects.

use crate::error::PendingChangeError;
use crate::ScratchStore;
use fleet_instructions::InstructionManager;
use fleet_ports::{ComponentFactories, ComponentFactory};
use fleet_proto::{ChangeKey, ChangeStatus, ComponentType, Instruction, Metadata, Operation, PendingChange};
use fleet_registry::ComponentRegistry;
use fleet_store::ClusterStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// What happened to one change during a batch apply.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The change published successfully.
    Applied(ChangeKey),
    /// The change failed to publish; the message is the error.
    Failed(ChangeKey, String),
}

/// The result of `ApplyAll` (§8 property 7: `applied + failed == total`).
#[derive(Debug, Clone)]
pub struct ApplySummary {
    /// How many verified changes were attempted.
    pub total: usize,
    /// How many published successfully.
    pub applied: usize,
    /// How many failed to publish.
    pub failed: usize,
    /// Per-change outcomes, in attempt order.
    pub outcomes: Vec<ApplyOutcome>,
}

/// Authoritative in-memory map of operator edits not yet published,
/// keyed by `(component_type, id)` (§4.G).
pub struct PendingChangeManager<S, T> {
    changes: Mutex<HashMap<ChangeKey, PendingChange>>,
    factories: Arc<ComponentFactories>,
    registry: Arc<ComponentRegistry>,
    instructions: Arc<InstructionManager<S>>,
    scratch: T,
}

impl<S, T> PendingChangeManager<S, T>
where
    S: ClusterStore + 'static,
    T: ScratchStore,
{
    /// Build an empty manager over `instructions`, verifying changes
    /// through `factories` and reading affected-project fan-out from
    /// `registry`.
    #[must_use]
    pub fn new(factories: Arc<ComponentFactories>, registry: Arc<ComponentRegistry>, instructions: Arc<InstructionManager<S>>, scratch: T) -> Self {
        Self {
            changes: Mutex::new(HashMap::new()),
            factories,
            registry,
            instructions,
            scratch,
        }
    }

    /// `AddChange` (§4.G): draft (or redraft) the change at `key`. A
    /// terminal status on the same key is overwritten.
    pub async fn add_change(&self, key: ChangeKey, new_content: impl Into<String>, old_content: Option<String>, is_new: bool) {
        let change = PendingChange::draft(key.clone(), new_content, old_content, is_new, now_secs());
        self.changes.lock().await.insert(key, change);
    }

    /// `VerifyChange` (§4.G): run the component factory's `verify`
    /// contract against the change's content. Pure with respect to the
    /// manager for unchanged content (§8): repeated calls land on the
    /// same terminal status.
    pub async fn verify_change(&self, key: &ChangeKey) -> Result<ChangeStatus, PendingChangeError> {
        let mut changes = self.changes.lock().await;
        let change = changes.get_mut(key).ok_or_else(|| PendingChangeError::NotFound(key.clone()))?;
        match self.factories.get(key.component_type).verify(&change.new_content).await {
            Ok(()) => {
                change.status = ChangeStatus::Verified;
                change.verified_at = Some(now_secs());
                change.error = None;
            }
            Err(err) => {
                change.status = ChangeStatus::Invalid;
                change.error = Some(err.to_string());
            }
        }
        change.last_updated = now_secs();
        Ok(change.status)
    }

    /// `GetAllChanges` (§6).
    pub async fn all_changes(&self) -> Vec<PendingChange> {
        self.changes.lock().await.values().cloned().collect()
    }

    /// `RemoveChange` (§4.G): drop the tracked entry and best-effort clear
    /// its scratch-file mirror.
    pub async fn remove_change(&self, key: &ChangeKey) {
        self.changes.lock().await.remove(key);
        if let Err(err) = self.scratch.remove(key) {
            tracing::warn!(component_type = ?key.component_type, id = %key.id, error = %err, "failed to remove scratch representation");
        }
    }

    /// `UpdateChangeStatus` (§4.G): force a status transition without
    /// going through verify/apply (used to cancel an in-flight verify,
    /// for instance).
    pub async fn update_change_status(&self, key: &ChangeKey, status: ChangeStatus) -> Result<(), PendingChangeError> {
        let mut changes = self.changes.lock().await;
        let change = changes.get_mut(key).ok_or_else(|| PendingChangeError::NotFound(key.clone()))?;
        change.status = status;
        change.last_updated = now_secs();
        Ok(())
    }

    /// `ApplySingle` (§4.G): publish one verified change as a
    /// `push_change` instruction and restart its affected projects.
    /// Errors if the change isn't `verified`.
    pub async fn apply_single(&self, key: &ChangeKey) -> Result<Vec<String>, PendingChangeError> {
        let content = {
            let changes = self.changes.lock().await;
            let change = changes.get(key).ok_or_else(|| PendingChangeError::NotFound(key.clone()))?;
            if change.status != ChangeStatus::Verified {
                return Err(PendingChangeError::NotVerified(key.clone()));
            }
            change.new_content.clone()
        };

        let affected = self.registry.get_affected_projects(key.component_type, &key.id);
        let instruction = push_change_instruction(key, content, &affected);
        let result = self.instructions.publish_instruction(instruction).await;

        let mut changes = self.changes.lock().await;
        if let Some(change) = changes.get_mut(key) {
            match &result {
                Ok(_) => {
                    change.status = ChangeStatus::Applied;
                    change.error = None;
                }
                Err(err) => {
                    change.status = ChangeStatus::Failed;
                    change.error = Some(err.to_string());
                }
            }
            change.last_updated = now_secs();
        }
        drop(changes);

        result.map(|_| affected).map_err(PendingChangeError::from)
    }

    /// `ApplyAll` (§4.G): attempt every currently `verified` change.
    /// Best-effort per change — one failure never aborts the batch (§8
    /// property 7: `applied + failed == total`) — then restart the union
    /// of projects affected across the whole batch.
    pub async fn apply_all(&self) -> ApplySummary {
        let verified: Vec<ChangeKey> = self
            .changes
            .lock()
            .await
            .iter()
            .filter(|(_, change)| change.status == ChangeStatus::Verified)
            .map(|(key, _)| key.clone())
            .collect();

        let total = verified.len();
        let mut applied = 0;
        let mut failed = 0;
        let mut restart_union = HashSet::new();
        let mut outcomes = Vec::with_capacity(total);

        for key in verified {
            match self.apply_single(&key).await {
                Ok(affected) => {
                    applied += 1;
                    restart_union.extend(affected);
                    outcomes.push(ApplyOutcome::Applied(key));
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(component_type = ?key.component_type, id = %key.id, error = %err, "change apply failed");
                    outcomes.push(ApplyOutcome::Failed(key, err.to_string()));
                }
            }
        }

        for project_id in restart_union {
            let restart = Instruction::new(0, ComponentType::Project, project_id.clone(), "", Operation::Restart, Vec::new(), Metadata::new(), 0);
            if let Err(err) = self.instructions.publish_instruction(restart).await {
                tracing::warn!(project_id, error = %err, "failed to restart project affected by a batch apply");
            }
        }

        ApplySummary { total, applied, failed, outcomes }
    }
}

fn push_change_instruction(key: &ChangeKey, content: String, affected: &[String]) -> Instruction {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), serde_json::json!("change_push"));
    if !affected.is_empty() {
        metadata.insert("affected_projects".to_string(), serde_json::json!(affected));
    }
    Instruction::new(0, key.component_type, key.id.clone(), content, Operation::PushChange, Vec::new(), metadata, 0)
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_ports::{ComponentInstance, FactoryError};
    use fleet_store::FakeStore;
    use std::any::Any;

    struct Stub;
    impl ComponentInstance for Stub {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct PassFactory;
    #[async_trait]
    impl ComponentFactory for PassFactory {
        async fn verify(&self, content: &str) -> Result<(), FactoryError> {
            if content == "bad" {
                Err(FactoryError::VerificationFailed("malformed content".to_string()))
            } else {
                Ok(())
            }
        }
        async fn build(&self, _id: &str, _content: &str) -> Result<Box<dyn ComponentInstance>, FactoryError> {
            Ok(Box::new(Stub))
        }
    }

    fn factories() -> Arc<ComponentFactories> {
        Arc::new(ComponentFactories::new(
            Arc::new(PassFactory),
            Arc::new(PassFactory),
            Arc::new(PassFactory),
            Arc::new(PassFactory),
            Arc::new(PassFactory),
        ))
    }

    fn manager() -> PendingChangeManager<FakeStore, crate::NullScratchStore> {
        let store = Arc::new(FakeStore::new());
        let instructions = Arc::new(InstructionManager::spawn(store, "sess1".to_string(), "leader".to_string(), 0));
        PendingChangeManager::new(factories(), Arc::new(ComponentRegistry::new()), instructions, crate::NullScratchStore)
    }

    #[tokio::test]
    async fn add_change_starts_as_draft() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        let changes = manager.all_changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, ChangeStatus::Draft);
    }

    #[tokio::test]
    async fn verify_change_transitions_to_verified_on_success() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        let status = manager.verify_change(&key).await.unwrap();
        assert_eq!(status, ChangeStatus::Verified);
    }

    #[tokio::test]
    async fn verify_change_transitions_to_invalid_on_failure() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "bad", None, true).await;
        let status = manager.verify_change(&key).await.unwrap();
        assert_eq!(status, ChangeStatus::Invalid);
        let changes = manager.all_changes().await;
        assert!(changes[0].error.is_some());
    }

    #[tokio::test]
    async fn verify_change_is_pure_on_repeated_calls() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        let first = manager.verify_change(&key).await.unwrap();
        let second = manager.verify_change(&key).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn apply_single_on_an_unverified_change_is_rejected() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        let result = manager.apply_single(&key).await;
        assert!(matches!(result, Err(PendingChangeError::NotVerified(_))));
    }

    #[tokio::test]
    async fn apply_single_publishes_and_marks_applied() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        manager.verify_change(&key).await.unwrap();
        manager.apply_single(&key).await.unwrap();
        let changes = manager.all_changes().await;
        assert_eq!(changes[0].status, ChangeStatus::Applied);
    }

    #[tokio::test]
    async fn remove_change_drops_the_tracked_entry() {
        let manager = manager();
        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, true).await;
        manager.remove_change(&key).await;
        assert!(manager.all_changes().await.is_empty());
    }

    #[tokio::test]
    async fn apply_all_preserves_applied_plus_failed_equals_total() {
        let manager = manager();
        let verified_key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(verified_key.clone(), "content", None, true).await;
        manager.verify_change(&verified_key).await.unwrap();

        let draft_key = ChangeKey::new(ComponentType::Input, "i1");
        manager.add_change(draft_key, "content", None, true).await;

        let summary = manager.apply_all().await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.applied + summary.failed, summary.total);
        assert_eq!(summary.applied, 1);
    }

    #[tokio::test]
    async fn apply_all_restarts_the_union_of_affected_projects() {
        let store = Arc::new(FakeStore::new());
        let instructions = Arc::new(InstructionManager::spawn(Arc::clone(&store), "sess1".to_string(), "leader".to_string(), 0));
        let registry = Arc::new(ComponentRegistry::new());
        registry.set_project_dependencies("p1", &[(ComponentType::Ruleset, "r1".to_string())]);
        registry.set_project_dependencies("p2", &[(ComponentType::Ruleset, "r1".to_string())]);
        let manager = PendingChangeManager::new(factories(), Arc::clone(&registry), Arc::clone(&instructions), crate::NullScratchStore);

        let key = ChangeKey::new(ComponentType::Ruleset, "r1");
        manager.add_change(key.clone(), "content", None, false).await;
        manager.verify_change(&key).await.unwrap();
        manager.apply_all().await;

        let history = instructions.recent_operations().await;
        // One publish for the change itself, two for the restarted projects.
        assert_eq!(history.len(), 3);
    }
}
