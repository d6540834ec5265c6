// SPDX-License-Identifier: Apache-2.0
//! Pure compaction-marking logic (§4.D step 4, §3 invariant 4): deciding
//! which log slots become dead. Kept free of store access so the rule
//! itself is unit-testable without a `ClusterStore`.

use fleet_proto::{ComponentType, Instruction};
use std::collections::{HashMap, HashSet};

/// Given the ordered list of live instructions for a session (the
/// surviving entries plus the newly appended one, in version order),
/// return the versions that must become compaction markers: for every
/// `(component_type, component_name, class)`, every entry but the latest
/// is superseded. `class` distinguishes CUD-class operations from
/// project-control-class ones — a `start` never supersedes an `update`
/// for the same project, and vice versa.
#[must_use]
pub fn versions_to_compact(entries: &[Instruction]) -> HashSet<u64> {
    let mut latest: HashMap<(ComponentType, &str, bool), u64> = HashMap::new();
    let mut to_compact = HashSet::new();
    for entry in entries {
        let key = (
            entry.component_type,
            entry.component_name.as_str(),
            entry.operation.is_project_control(),
        );
        if let Some(&previous_version) = latest.get(&key) {
            to_compact.insert(previous_version);
        }
        latest.insert(key, entry.version);
    }
    to_compact
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fleet_proto::{Metadata, Operation};

    fn instr(version: u64, component_type: ComponentType, name: &str, operation: Operation) -> Instruction {
        Instruction::new(version, component_type, name, "{}", operation, vec![], Metadata::new(), 0)
    }

    #[test]
    fn no_compaction_when_every_identity_is_unique() {
        let entries = vec![
            instr(1, ComponentType::Input, "i1", Operation::Add),
            instr(2, ComponentType::Output, "o1", Operation::Add),
        ];
        assert!(versions_to_compact(&entries).is_empty());
    }

    #[test]
    fn later_cud_instruction_supersedes_the_earlier_one() {
        let entries = vec![
            instr(1, ComponentType::Ruleset, "r1", Operation::Add),
            instr(2, ComponentType::Ruleset, "r1", Operation::Update),
        ];
        let compacted = versions_to_compact(&entries);
        assert_eq!(compacted, HashSet::from([1]));
    }

    #[test]
    fn only_the_latest_of_a_chain_survives() {
        let entries = vec![
            instr(1, ComponentType::Ruleset, "r1", Operation::Add),
            instr(2, ComponentType::Ruleset, "r1", Operation::Update),
            instr(3, ComponentType::Ruleset, "r1", Operation::Update),
        ];
        let compacted = versions_to_compact(&entries);
        assert_eq!(compacted, HashSet::from([1, 2]));
    }

    #[test]
    fn project_control_and_cud_classes_never_compact_each_other() {
        let entries = vec![
            instr(1, ComponentType::Project, "p1", Operation::Add),
            instr(2, ComponentType::Project, "p1", Operation::Start),
        ];
        assert!(versions_to_compact(&entries).is_empty());
    }

    #[test]
    fn repeated_project_control_operations_compact_within_their_own_class() {
        let entries = vec![
            instr(1, ComponentType::Project, "p1", Operation::Start),
            instr(2, ComponentType::Project, "p1", Operation::Stop),
        ];
        let compacted = versions_to_compact(&entries);
        assert_eq!(compacted, HashSet::from([1]));
    }
}
