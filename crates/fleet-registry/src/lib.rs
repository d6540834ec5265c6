// SPDX-License-Identifier: Apache-2.0
//! The component registry (§4.H): an in-process map of live component
//! instances (inputs, outputs, rulesets, plugins, projects) with safe
//! accessors, sharded per component type so readers never block writers
//! of a different type (§9's "avoid the global-mutex pattern").

use fleet_ports::ComponentInstance;
use fleet_proto::ComponentType;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

type InstanceMap = RwLock<HashMap<String, Arc<dyn ComponentInstance>>>;

fn new_instance_map() -> InstanceMap {
    RwLock::new(HashMap::new())
}

/// Concurrency-safe map of `(component_type, id) -> instance`, sharded by
/// component type. The component registry is a pure function of the
/// applied instructions: it can always be safely cleared and rebuilt by
/// re-applying from version 1 (§3 invariants).
pub struct ComponentRegistry {
    inputs: InstanceMap,
    outputs: InstanceMap,
    rulesets: InstanceMap,
    plugins: InstanceMap,
    projects: InstanceMap,
    /// `(component_type, component_name) -> project ids depending on it`,
    /// maintained incrementally as projects are constructed/removed (§9),
    /// not recomputed by scanning on each mutation.
    dependents: RwLock<HashMap<(ComponentType, String), HashSet<String>>>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inputs: new_instance_map(),
            outputs: new_instance_map(),
            rulesets: new_instance_map(),
            plugins: new_instance_map(),
            projects: new_instance_map(),
            dependents: RwLock::new(HashMap::new()),
        }
    }

    fn map_for(&self, component_type: ComponentType) -> &InstanceMap {
        match component_type {
            ComponentType::Input => &self.inputs,
            ComponentType::Output => &self.outputs,
            ComponentType::Ruleset => &self.rulesets,
            ComponentType::Plugin => &self.plugins,
            ComponentType::Project => &self.projects,
        }
    }

    /// Look up a live instance. Readers never block writers of a
    /// different component type, and only briefly block writers of the
    /// same type.
    #[must_use]
    pub fn get(&self, component_type: ComponentType, id: &str) -> Option<Arc<dyn ComponentInstance>> {
        self.map_for(component_type)
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Replace (or insert) the instance at `(component_type, id)`.
    pub fn set(&self, component_type: ComponentType, id: impl Into<String>, instance: Arc<dyn ComponentInstance>) {
        self.map_for(component_type)
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id.into(), instance);
    }

    /// Remove the instance at `(component_type, id)`, if any, returning
    /// it so the caller can run any teardown it needs before it's
    /// dropped.
    pub fn delete(&self, component_type: ComponentType, id: &str) -> Option<Arc<dyn ComponentInstance>> {
        self.map_for(component_type)
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id)
    }

    /// `true` if an instance exists at `(component_type, id)`.
    #[must_use]
    pub fn contains(&self, component_type: ComponentType, id: &str) -> bool {
        self.map_for(component_type)
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(id)
    }

    /// A stable snapshot of every live id for `component_type`. Iteration
    /// never observes a half-mutated map: the snapshot is cloned under a
    /// single read lock.
    #[must_use]
    pub fn ids(&self, component_type: ComponentType) -> Vec<String> {
        self.map_for(component_type)
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Record that `project_id` depends on `(component_type, component_name)`,
    /// called when the project is constructed (or its dependency set
    /// changes). Replaces any previously recorded dependencies for this
    /// project with `deps`.
    pub fn set_project_dependencies(&self, project_id: &str, deps: &[(ComponentType, String)]) {
        let mut dependents = self
            .dependents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        dependents.retain(|_, projects| {
            projects.remove(project_id);
            true
        });
        for (component_type, component_name) in deps {
            dependents
                .entry((*component_type, component_name.clone()))
                .or_default()
                .insert(project_id.to_string());
        }
    }

    /// Drop every dependency edge recorded for `project_id` (called when
    /// the project is deleted).
    pub fn remove_project_dependencies(&self, project_id: &str) {
        let mut dependents = self
            .dependents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for projects in dependents.values_mut() {
            projects.remove(project_id);
        }
    }

    /// All projects declaring a dependency on `(component_type, id)`,
    /// restarted after the component is mutated.
    #[must_use]
    pub fn get_affected_projects(&self, component_type: ComponentType, id: &str) -> Vec<String> {
        self.dependents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(component_type, id.to_string()))
            .map(|projects| projects.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear every component instance and every dependency edge. Always
    /// safe: the registry is re-derivable by replaying the instruction
    /// log from version 1 (§3).
    pub fn clear_all(&self) {
        for map in [&self.inputs, &self.outputs, &self.rulesets, &self.plugins, &self.projects] {
            map.write().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
        }
        self.dependents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::any::Any;

    struct Stub;
    impl ComponentInstance for Stub {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn set_get_delete_round_trip() {
        let registry = ComponentRegistry::new();
        assert!(registry.get(ComponentType::Input, "i1").is_none());
        registry.set(ComponentType::Input, "i1", Arc::new(Stub));
        assert!(registry.contains(ComponentType::Input, "i1"));
        assert!(registry.delete(ComponentType::Input, "i1").is_some());
        assert!(!registry.contains(ComponentType::Input, "i1"));
    }

    #[test]
    fn different_component_types_do_not_collide() {
        let registry = ComponentRegistry::new();
        registry.set(ComponentType::Input, "x", Arc::new(Stub));
        registry.set(ComponentType::Output, "x", Arc::new(Stub));
        assert!(registry.contains(ComponentType::Input, "x"));
        assert!(registry.contains(ComponentType::Output, "x"));
        registry.delete(ComponentType::Input, "x");
        assert!(!registry.contains(ComponentType::Input, "x"));
        assert!(registry.contains(ComponentType::Output, "x"));
    }

    #[test]
    fn affected_projects_reflects_declared_dependencies() {
        let registry = ComponentRegistry::new();
        registry.set_project_dependencies(
            "p1",
            &[
                (ComponentType::Ruleset, "r1".to_string()),
                (ComponentType::Input, "i1".to_string()),
            ],
        );
        registry.set_project_dependencies("p2", &[(ComponentType::Ruleset, "r1".to_string())]);
        let mut affected = registry.get_affected_projects(ComponentType::Ruleset, "r1");
        affected.sort();
        assert_eq!(affected, vec!["p1", "p2"]);
        assert_eq!(registry.get_affected_projects(ComponentType::Input, "i1"), vec!["p1"]);
    }

    #[test]
    fn removing_project_dependencies_drops_all_its_edges() {
        let registry = ComponentRegistry::new();
        registry.set_project_dependencies("p1", &[(ComponentType::Ruleset, "r1".to_string())]);
        registry.remove_project_dependencies("p1");
        assert!(registry.get_affected_projects(ComponentType::Ruleset, "r1").is_empty());
    }

    #[test]
    fn redeclaring_dependencies_replaces_the_old_set() {
        let registry = ComponentRegistry::new();
        registry.set_project_dependencies("p1", &[(ComponentType::Ruleset, "r1".to_string())]);
        registry.set_project_dependencies("p1", &[(ComponentType::Ruleset, "r2".to_string())]);
        assert!(registry.get_affected_projects(ComponentType::Ruleset, "r1").is_empty());
        assert_eq!(registry.get_affected_projects(ComponentType::Ruleset, "r2"), vec!["p1"]);
    }

    #[test]
    fn clear_all_empties_instances_and_dependencies() {
        let registry = ComponentRegistry::new();
        registry.set(ComponentType::Input, "i1", Arc::new(Stub));
        registry.set_project_dependencies("p1", &[(ComponentType::Input, "i1".to_string())]);
        registry.clear_all();
        assert!(!registry.contains(ComponentType::Input, "i1"));
        assert!(registry.get_affected_projects(ComponentType::Input, "i1").is_empty());
    }
}
