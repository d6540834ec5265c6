// SPDX-License-Identifier: Apache-2.0
//! Leader boot initialisation (§4.D): clean up a stale prior session,
//! then emit `add` instructions in dependency order followed by `start`
//! for projects whose persisted intent is "running".

use crate::error::InstructionError;
use crate::manager::InstructionManager;
use crate::util::now_secs;
use fleet_proto::{ComponentType, Instruction, Metadata, Operation};
use fleet_store::{keys, ClusterStore};

/// One component to seed at boot: its type, stable name, and opaque
/// content.
#[derive(Debug, Clone)]
pub struct BootComponent {
    /// The kind of component.
    pub component_type: ComponentType,
    /// Stable identifier, unique within `component_type`.
    pub name: String,
    /// Opaque configuration text.
    pub content: String,
    /// Names this component itself depends on (e.g. a project's inputs,
    /// outputs and rulesets), carried verbatim on the `add` instruction's
    /// `dependencies` for the registry to resolve into its adjacency map
    /// (§4.H) once the component is constructed.
    pub dependencies: Vec<String>,
}

/// Clean up a stale prior session (best-effort, bounded by
/// `max_instructions`), then emit the boot sequence: `add` for every
/// component in `ComponentType::BOOT_ORDER`, followed by `start` for
/// each name in `running_projects`.
pub async fn initialize_on_boot<S: ClusterStore + 'static>(
    manager: &InstructionManager<S>,
    store: &S,
    components: &[BootComponent],
    running_projects: &[String],
    max_instructions: u64,
) -> Result<(), InstructionError> {
    cleanup_stale_session(manager, store, max_instructions).await?;

    for component_type in ComponentType::BOOT_ORDER {
        for component in components.iter().filter(|c| c.component_type == component_type) {
            let instruction = Instruction::new(
                0,
                component.component_type,
                component.name.clone(),
                component.content.clone(),
                Operation::Add,
                component.dependencies.clone(),
                Metadata::new(),
                now_secs(),
            );
            manager.publish_instruction(instruction).await?;
        }
    }

    for project in running_projects {
        let instruction = Instruction::new(
            0,
            ComponentType::Project,
            project.clone(),
            String::new(),
            Operation::Start,
            vec![],
            Metadata::new(),
            now_secs(),
        );
        manager.publish_instruction(instruction).await?;
    }

    Ok(())
}

async fn cleanup_stale_session<S: ClusterStore + 'static>(
    manager: &InstructionManager<S>,
    store: &S,
    max_instructions: u64,
) -> Result<(), InstructionError> {
    let Some(previous_raw) = store.get(&keys::leader_version()).await.map_err(InstructionError::StoreExhausted)? else {
        return Ok(());
    };
    let previous: fleet_proto::LeaderVersion = previous_raw.parse()?;
    if previous.session == manager.session() {
        return Ok(());
    }

    let bound = previous.counter.min(max_instructions);
    for version in 1..=bound {
        if let Err(err) = store.del(&keys::instruction(version)).await {
            tracing::warn!(version, error = %err, "failed to delete stale instruction during boot cleanup");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fleet_proto::LogSlot;
    use fleet_store::FakeStore;
    use std::sync::Arc;

    async fn fetch(store: &FakeStore, version: u64) -> Instruction {
        let raw = store.get(&keys::instruction(version)).await.unwrap().unwrap();
        let slot: LogSlot = serde_json::from_str(&raw).unwrap();
        slot.instruction().cloned().unwrap()
    }

    #[tokio::test]
    async fn emits_adds_in_boot_order_then_start_for_running_projects() {
        let store = Arc::new(FakeStore::new());
        let manager = InstructionManager::spawn(Arc::clone(&store), "sess1".to_string(), "leader".to_string(), 0);

        let components = vec![
            BootComponent {
                component_type: ComponentType::Project,
                name: "p1".to_string(),
                content: String::new(),
                dependencies: vec![],
            },
            BootComponent {
                component_type: ComponentType::Input,
                name: "i1".to_string(),
                content: "{}".to_string(),
                dependencies: vec![],
            },
            BootComponent {
                component_type: ComponentType::Output,
                name: "o1".to_string(),
                content: "{}".to_string(),
                dependencies: vec![],
            },
            BootComponent {
                component_type: ComponentType::Ruleset,
                name: "r1".to_string(),
                content: "{}".to_string(),
                dependencies: vec![],
            },
        ];

        initialize_on_boot(&manager, &store, &components, &["p1".to_string()], 1000)
            .await
            .unwrap();

        assert_eq!(manager.current_version().await.counter, 5);

        assert_eq!(fetch(&store, 1).await.component_name, "i1");
        assert_eq!(fetch(&store, 2).await.component_name, "o1");
        assert_eq!(fetch(&store, 3).await.component_name, "r1");
        assert_eq!(fetch(&store, 4).await.component_name, "p1");
        assert_eq!(fetch(&store, 4).await.operation, Operation::Add);
        assert_eq!(fetch(&store, 5).await.component_name, "p1");
        assert_eq!(fetch(&store, 5).await.operation, Operation::Start);
    }

    #[tokio::test]
    async fn a_new_session_with_no_prior_leader_version_skips_cleanup() {
        let store = FakeStore::new();
        let manager = InstructionManager::spawn(Arc::new(FakeStore::new()), "sess1".to_string(), "leader".to_string(), 0);
        cleanup_stale_session(&manager, &store, 10).await.unwrap();
    }
}
