// SPDX-License-Identifier: Apache-2.0
//! The instruction: an immutable record describing one mutation to the
//! configuration fleet, plus the compaction marker that supersedes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of component an instruction mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    /// A data input.
    Input,
    /// A data output.
    Output,
    /// A rule set.
    Ruleset,
    /// A plugin.
    Plugin,
    /// A project (a running pipeline tying inputs/outputs/rulesets together).
    Project,
}

impl ComponentType {
    /// All component types, in the dependency order the leader emits `add`
    /// instructions at boot: inputs, outputs, plugins, rulesets, projects.
    pub const BOOT_ORDER: [ComponentType; 5] = [
        ComponentType::Input,
        ComponentType::Output,
        ComponentType::Plugin,
        ComponentType::Ruleset,
        ComponentType::Project,
    ];
}

/// The mutation an instruction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Create a new component instance.
    Add,
    /// Remove a component instance.
    Delete,
    /// Replace a component instance's content.
    Update,
    /// An operator-pushed change, published through the pending-change
    /// workflow. Identical to `Update`/`Add` on replay; only the history
    /// tag differs.
    PushChange,
    /// A locally originated push, distinct from `PushChange` only in its
    /// history tag. Treated identically on replay.
    LocalPush,
    /// Start a project.
    Start,
    /// Stop a project.
    Stop,
    /// Restart a project.
    Restart,
}

/// Grouping used by the compaction rule to decide which instruction pairs
/// for the same `(component_type, component_name)` may supersede each
/// other. Two instructions only compact against each other if they share
/// a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionClass {
    /// Create/update/delete-class operations (including the push variants).
    Cud,
    /// Project lifecycle operations (start/stop/restart).
    ProjectControl,
}

impl Operation {
    /// Whether this operation is a project start/stop/restart, as opposed
    /// to a create/update/delete of a component's configuration.
    #[must_use]
    pub fn is_project_control(self) -> bool {
        matches!(self, Operation::Start | Operation::Stop | Operation::Restart)
    }

    /// `requires_restart` is true for every CUD-class operation; project
    /// control operations don't themselves require anything to restart
    /// (they *are* the restart).
    #[must_use]
    pub fn requires_restart(self) -> bool {
        !self.is_project_control()
    }

    /// The compaction-pairing class this operation belongs to.
    #[must_use]
    pub fn compaction_class(self) -> CompactionClass {
        if self.is_project_control() {
            CompactionClass::ProjectControl
        } else {
            CompactionClass::Cud
        }
    }
}

/// Free-form metadata carried by an instruction (affected projects, source
/// tag, batch hints). Kept as an ordered map so wire output is stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// An immutable instruction: one mutation to the configuration fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// 1-based, monotonic within a leader session.
    pub version: u64,
    /// The kind of component being mutated.
    pub component_type: ComponentType,
    /// Stable identifier, unique within `component_type`.
    pub component_name: String,
    /// Opaque configuration text; format is the component's concern.
    pub content: String,
    /// The mutation being performed.
    pub operation: Operation,
    /// Project names to restart after this instruction is applied.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Free-form metadata (`affected_projects`, `source`, batch hints).
    #[serde(default)]
    pub metadata: Metadata,
    /// Monotonic seconds at creation time.
    pub timestamp: i64,
    /// Derived from `operation`; always recomputed on construction, never
    /// trusted verbatim from an untrusted wire payload.
    pub requires_restart: bool,
}

impl Instruction {
    /// Build a new instruction, computing `requires_restart` from
    /// `operation` rather than accepting it as an independent input.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        version: u64,
        component_type: ComponentType,
        component_name: impl Into<String>,
        content: impl Into<String>,
        operation: Operation,
        dependencies: Vec<String>,
        metadata: Metadata,
        timestamp: i64,
    ) -> Self {
        Self {
            version,
            component_type,
            component_name: component_name.into(),
            content: content.into(),
            operation,
            dependencies,
            metadata,
            timestamp,
            requires_restart: operation.requires_restart(),
        }
    }

    /// Recompute `requires_restart` from `operation`. Call this after
    /// deserializing an instruction from an untrusted source (the shared
    /// store) so a tampered or stale wire value can never diverge from the
    /// operation it claims to describe.
    pub fn normalize(&mut self) {
        self.requires_restart = self.operation.requires_restart();
    }

    /// The `(component_type, component_name)` identity this instruction
    /// mutates; two instructions sharing this key and a compaction class
    /// may supersede each other.
    #[must_use]
    pub fn identity(&self) -> (ComponentType, &str) {
        (self.component_type, self.component_name.as_str())
    }

    /// Project names from `metadata["affected_projects"]`, if present and
    /// well-formed; otherwise empty.
    #[must_use]
    pub fn affected_projects(&self) -> Vec<String> {
        self.metadata
            .get("affected_projects")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The `source` tag from metadata, if present (e.g. `"change_push"`).
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(serde_json::Value::as_str)
    }
}

/// The sentinel value stored in `component_type` of a compaction marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteSentinel {
    /// The literal `"DELETE"`.
    #[serde(rename = "DELETE")]
    Delete,
}

/// A reserved marker stored in a log slot to indicate it has been
/// compacted away. Serializes as the literal `{"component_type":"DELETE"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionMarker {
    /// Always `DeleteSentinel::Delete`.
    pub component_type: DeleteSentinel,
}

impl CompactionMarker {
    /// A fresh compaction marker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            component_type: DeleteSentinel::Delete,
        }
    }
}

impl Default for CompactionMarker {
    fn default() -> Self {
        Self::new()
    }
}

/// What occupies a log slot: a live instruction, or a compaction marker.
/// `serde(untagged)` tries `Marker` first: it only matches when
/// `component_type` is exactly `"DELETE"`, so real instructions always
/// fall through to the `Instruction` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogSlot {
    /// A compacted, dead slot.
    Marker(CompactionMarker),
    /// A live instruction.
    Instruction(Instruction),
}

impl LogSlot {
    /// `true` if this slot has been compacted away.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, LogSlot::Marker(_))
    }

    /// The instruction in this slot, if it hasn't been compacted away.
    #[must_use]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            LogSlot::Instruction(i) => Some(i),
            LogSlot::Marker(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn marker_round_trips_through_the_literal_schema() {
        let marker = CompactionMarker::new();
        let json = serde_json::to_string(&marker).unwrap();
        assert_eq!(json, r#"{"component_type":"DELETE"}"#);

        let slot: LogSlot = serde_json::from_str(&json).unwrap();
        assert!(slot.is_marker());
    }

    #[test]
    fn real_instruction_falls_through_to_the_instruction_arm() {
        let instr = Instruction::new(
            1,
            ComponentType::Input,
            "i1",
            "{}",
            Operation::Add,
            vec![],
            Metadata::new(),
            100,
        );
        let json = serde_json::to_string(&instr).unwrap();
        let slot: LogSlot = serde_json::from_str(&json).unwrap();
        assert!(!slot.is_marker());
        assert_eq!(slot.instruction().unwrap().component_name, "i1");
    }

    #[test]
    fn requires_restart_excludes_project_control_operations() {
        assert!(Operation::Add.requires_restart());
        assert!(Operation::Update.requires_restart());
        assert!(Operation::Delete.requires_restart());
        assert!(Operation::PushChange.requires_restart());
        assert!(Operation::LocalPush.requires_restart());
        assert!(!Operation::Start.requires_restart());
        assert!(!Operation::Stop.requires_restart());
        assert!(!Operation::Restart.requires_restart());
    }

    #[test]
    fn normalize_overwrites_a_tampered_requires_restart_field() {
        let mut instr = Instruction::new(
            1,
            ComponentType::Project,
            "p1",
            "{}",
            Operation::Start,
            vec![],
            Metadata::new(),
            100,
        );
        instr.requires_restart = true; // tampered
        instr.normalize();
        assert!(!instr.requires_restart);
    }

    #[test]
    fn affected_projects_reads_metadata_array() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "affected_projects".to_string(),
            serde_json::json!(["p1", "p2"]),
        );
        let instr = Instruction::new(
            2,
            ComponentType::Ruleset,
            "r1",
            "{}",
            Operation::Update,
            vec![],
            metadata,
            100,
        );
        assert_eq!(instr.affected_projects(), vec!["p1", "p2"]);
    }
}
