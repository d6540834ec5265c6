// SPDX-License-Identifier: Apache-2.0
//! `applyInstruction` (§4.F): construct/replace/remove a component
//! instance or delegate to the project command handler, then restart
//! every project named in `metadata.affected_projects` once the mutation
//! lands.

use crate::error::SyncError;
use fleet_ports::{ComponentFactories, ComponentFactory, ProjectAction, ProjectCommandHandler};
use fleet_proto::{ComponentType, Instruction, Operation};
use fleet_registry::ComponentRegistry;
use std::sync::Arc;

/// The component types a project may declare a dependency on. Checked in
/// this order when resolving a bare dependency name back to its type (see
/// [`resolve_dependency_types`]).
const DEPENDENCY_TYPES: [ComponentType; 4] = [
    ComponentType::Input,
    ComponentType::Output,
    ComponentType::Ruleset,
    ComponentType::Plugin,
];

/// Apply one instruction to the follower's registry (§4.F
/// `applyInstruction`). `add`/`local_push`/`push_change` are identical on
/// replay, differing only in their history tag (§9 open question);
/// `update` deletes then reconstructs; `delete` removes (stopping a
/// running project first); `start`/`stop`/`restart` delegate to the
/// project command handler. Every CUD-class operation finishes by
/// restarting the projects named in `metadata.affected_projects`.
pub async fn apply_instruction<P: ProjectCommandHandler>(
    instruction: &Instruction,
    registry: &ComponentRegistry,
    factories: &ComponentFactories,
    projects: &P,
) -> Result<(), SyncError> {
    match instruction.operation {
        Operation::Add | Operation::LocalPush | Operation::PushChange => {
            construct_and_place(instruction, registry, factories).await?;
        }
        Operation::Update => {
            registry.delete(instruction.component_type, &instruction.component_name);
            construct_and_place(instruction, registry, factories).await?;
        }
        Operation::Delete => {
            if instruction.component_type == ComponentType::Project {
                stop_best_effort(&instruction.component_name, projects).await;
                registry.remove_project_dependencies(&instruction.component_name);
            }
            registry.delete(instruction.component_type, &instruction.component_name);
        }
        Operation::Start => {
            projects.execute(&instruction.component_name, ProjectAction::Start, true).await?;
        }
        Operation::Stop => {
            projects.execute(&instruction.component_name, ProjectAction::Stop, true).await?;
        }
        Operation::Restart => {
            projects.execute(&instruction.component_name, ProjectAction::Restart, true).await?;
        }
    }

    if instruction.operation.requires_restart() {
        for project_id in instruction.affected_projects() {
            projects.execute(&project_id, ProjectAction::Restart, true).await?;
        }
    }

    Ok(())
}

async fn construct_and_place(
    instruction: &Instruction,
    registry: &ComponentRegistry,
    factories: &ComponentFactories,
) -> Result<(), SyncError> {
    let instance = factories
        .get(instruction.component_type)
        .build(&instruction.component_name, &instruction.content)
        .await?;
    registry.set(instruction.component_type, instruction.component_name.clone(), Arc::from(instance));

    if instruction.component_type == ComponentType::Project {
        let deps = resolve_dependency_types(registry, &instruction.dependencies);
        registry.set_project_dependencies(&instruction.component_name, &deps);
    }

    Ok(())
}

async fn stop_best_effort<P: ProjectCommandHandler>(project_id: &str, projects: &P) {
    if let Err(err) = projects.execute(project_id, ProjectAction::Stop, false).await {
        tracing::warn!(project_id, error = %err, "failed to stop project ahead of delete");
    }
}

/// Resolve a project's bare dependency names (§9 open question: the
/// source only ever uses this field for a project's own component
/// dependencies, not for cross-project restart lists) back to
/// `(component_type, name)` pairs by checking which non-project registry
/// already holds an instance with that name. A name present in more than
/// one component type at once is unspecified by the source; the first
/// match in `DEPENDENCY_TYPES` order wins.
fn resolve_dependency_types(registry: &ComponentRegistry, names: &[String]) -> Vec<(ComponentType, String)> {
    names
        .iter()
        .filter_map(|name| {
            DEPENDENCY_TYPES
                .into_iter()
                .find(|&component_type| registry.contains(component_type, name))
                .map(|component_type| (component_type, name.clone()))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_ports::{ComponentInstance, FactoryError, ProjectCommandError};
    use fleet_proto::Metadata;
    use std::any::Any;
    use tokio::sync::Mutex;

    struct Stub;
    impl ComponentInstance for Stub {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct AlwaysBuilds;
    #[async_trait]
    impl fleet_ports::ComponentFactory for AlwaysBuilds {
        async fn verify(&self, _content: &str) -> Result<(), FactoryError> {
            Ok(())
        }
        async fn build(&self, _id: &str, _content: &str) -> Result<Box<dyn ComponentInstance>, FactoryError> {
            Ok(Box::new(Stub))
        }
    }

    fn factories() -> ComponentFactories {
        ComponentFactories::new(
            Arc::new(AlwaysBuilds),
            Arc::new(AlwaysBuilds),
            Arc::new(AlwaysBuilds),
            Arc::new(AlwaysBuilds),
            Arc::new(AlwaysBuilds),
        )
    }

    #[derive(Default)]
    struct RecordingProjects {
        calls: Mutex<Vec<(String, ProjectAction)>>,
    }

    #[async_trait]
    impl ProjectCommandHandler for RecordingProjects {
        async fn execute(&self, project_id: &str, action: ProjectAction, _record_operation: bool) -> Result<(), ProjectCommandError> {
            self.calls.lock().await.push((project_id.to_string(), action));
            Ok(())
        }
    }

    fn instr(component_type: ComponentType, name: &str, operation: Operation, dependencies: Vec<String>, metadata: Metadata) -> Instruction {
        Instruction::new(1, component_type, name, "{}", operation, dependencies, metadata, 0)
    }

    #[tokio::test]
    async fn add_places_an_instance_in_the_registry() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        let instruction = instr(ComponentType::Input, "i1", Operation::Add, vec![], Metadata::new());
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        assert!(registry.contains(ComponentType::Input, "i1"));
    }

    #[tokio::test]
    async fn update_replaces_the_existing_instance() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        registry.set(ComponentType::Ruleset, "r1", Arc::new(Stub));
        let instruction = instr(ComponentType::Ruleset, "r1", Operation::Update, vec![], Metadata::new());
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        assert!(registry.contains(ComponentType::Ruleset, "r1"));
    }

    #[tokio::test]
    async fn delete_of_a_project_stops_it_first() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        registry.set(ComponentType::Project, "p1", Arc::new(Stub));
        let instruction = instr(ComponentType::Project, "p1", Operation::Delete, vec![], Metadata::new());
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        assert!(!registry.contains(ComponentType::Project, "p1"));
        let calls = projects.calls.lock().await;
        assert_eq!(calls.as_slice(), [("p1".to_string(), ProjectAction::Stop)]);
    }

    #[tokio::test]
    async fn start_delegates_to_the_project_command_handler() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        let instruction = instr(ComponentType::Project, "p1", Operation::Start, vec![], Metadata::new());
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        let calls = projects.calls.lock().await;
        assert_eq!(calls.as_slice(), [("p1".to_string(), ProjectAction::Start)]);
    }

    #[tokio::test]
    async fn cud_operations_restart_affected_projects() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        let mut metadata = Metadata::new();
        metadata.insert("affected_projects".to_string(), serde_json::json!(["p1"]));
        let instruction = instr(ComponentType::Ruleset, "r1", Operation::Update, vec![], metadata);
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        let calls = projects.calls.lock().await;
        assert_eq!(calls.as_slice(), [("p1".to_string(), ProjectAction::Restart)]);
    }

    #[tokio::test]
    async fn project_control_operations_do_not_trigger_affected_project_restarts() {
        let registry = ComponentRegistry::new();
        let factories = factories();
        let projects = RecordingProjects::default();
        let mut metadata = Metadata::new();
        metadata.insert("affected_projects".to_string(), serde_json::json!(["p1"]));
        let instruction = instr(ComponentType::Project, "p1", Operation::Start, vec![], metadata);
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        let calls = projects.calls.lock().await;
        assert_eq!(calls.as_slice(), [("p1".to_string(), ProjectAction::Start)]);
    }

    #[tokio::test]
    async fn adding_a_project_resolves_its_dependencies_by_scanning_the_registry() {
        let registry = ComponentRegistry::new();
        registry.set(ComponentType::Ruleset, "r1", Arc::new(Stub));
        registry.set(ComponentType::Input, "i1", Arc::new(Stub));
        let factories = factories();
        let projects = RecordingProjects::default();
        let instruction = instr(
            ComponentType::Project,
            "p1",
            Operation::Add,
            vec!["r1".to_string(), "i1".to_string()],
            Metadata::new(),
        );
        apply_instruction(&instruction, &registry, &factories, &projects).await.unwrap();
        let mut affected = registry.get_affected_projects(ComponentType::Ruleset, "r1");
        affected.sort();
        assert_eq!(affected, vec!["p1".to_string()]);
        assert_eq!(registry.get_affected_projects(ComponentType::Input, "i1"), vec!["p1".to_string()]);
    }

    #[test]
    fn unresolvable_dependency_names_are_dropped() {
        let registry = ComponentRegistry::new();
        let deps = resolve_dependency_types(&registry, &["ghost".to_string()]);
        assert!(deps.is_empty());
    }
}
