// SPDX-License-Identifier: Apache-2.0
//! The complete cleanup procedure (§4.F, §9 "force-cleanup discipline"):
//! used on session change, a full resync, or after an unrecoverable apply
//! failure. Every running project is force-stopped before any registry
//! entry is deleted, so background workers never touch a freed handle.

use fleet_ports::{ProjectAction, ProjectCommandHandler};
use fleet_proto::ComponentType;
use fleet_registry::ComponentRegistry;
use std::time::Duration;
use tokio::time::sleep;

const INTER_STOP_DELAY: Duration = Duration::from_millis(50);
const POST_CLEANUP_DELAY: Duration = Duration::from_millis(100);

/// The order component instances are torn down in: projects first (so
/// nothing is still running against freed inputs/outputs/rulesets), then
/// inputs, outputs, rulesets. Plugins are purely configuration and carry
/// no cleanup hook (§9 open question), so they're cleared last with the
/// rest of the registry.
const TEARDOWN_ORDER: [ComponentType; 4] = [
    ComponentType::Project,
    ComponentType::Input,
    ComponentType::Output,
    ComponentType::Ruleset,
];

/// Force-stop every project regardless of its recorded state, then delete
/// every component instance in `TEARDOWN_ORDER`, then clear whatever's
/// left (plugins, dependency edges), then sleep briefly for resource
/// release.
pub async fn cleanup_all<P: ProjectCommandHandler>(registry: &ComponentRegistry, projects: &P) {
    for project_id in registry.ids(ComponentType::Project) {
        if let Err(err) = projects.execute(&project_id, ProjectAction::Stop, false).await {
            tracing::warn!(project_id, error = %err, "force-stop during cleanup failed");
        }
        sleep(INTER_STOP_DELAY).await;
    }

    for component_type in TEARDOWN_ORDER {
        for id in registry.ids(component_type) {
            registry.delete(component_type, &id);
        }
    }
    registry.clear_all();

    sleep(POST_CLEANUP_DELAY).await;
}
