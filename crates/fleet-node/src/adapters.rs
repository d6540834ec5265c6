// SPDX-License-Identifier: Apache-2.0
//! Default adapters for the ports the cluster coordination core holds
//! onto external collaborators it doesn't implement itself (§1): leader
//! lock acquisition, system metrics, project lifecycle, and component
//! construction are all out of scope for the core, so this binary wires
//! in boundary stand-ins a real deployment would replace.

use async_trait::async_trait;
use fleet_heartbeat::LeaderVersionSource;
use fleet_instructions::InstructionManager;
use fleet_ports::{ComponentFactory, ComponentInstance, FactoryError, LeaderLock, ProjectAction, ProjectCommandError, ProjectCommandHandler};
use fleet_proto::LeaderVersion;
use fleet_store::ClusterStore;
use std::sync::Arc;

/// A leader lock that's simply held for the process's lifetime. Real
/// acquisition/renewal against an external coordination service is out
/// of scope (§1: "leader is externally elected") — this node trusts the
/// `--role leader` hint it was started with.
pub struct StaticLeaderLock;

impl LeaderLock for StaticLeaderLock {
    fn is_held(&self) -> bool {
        true
    }
}

/// A metrics source reporting nothing, for a node with no concrete
/// resource sampler wired in (`fleet_heartbeat::SystemMetricsSource`'s
/// own doc: "a node with nothing to report can use a fixed/zeroed
/// implementation").
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroMetrics;

impl fleet_heartbeat::SystemMetricsSource for ZeroMetrics {
    fn sample(&self) -> fleet_heartbeat::SystemMetrics {
        fleet_heartbeat::SystemMetrics::default()
    }
}

/// A project command handler that performs no real lifecycle action.
/// The concrete project runtime is out of scope for the core (§1);
/// until one is wired in, start/stop/restart are no-ops logged at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProjectCommandHandler;

#[async_trait]
impl ProjectCommandHandler for NoopProjectCommandHandler {
    async fn execute(&self, project_id: &str, action: ProjectAction, record_operation: bool) -> Result<(), ProjectCommandError> {
        tracing::info!(project_id, ?action, record_operation, "project command handler not wired, no-op");
        Ok(())
    }
}

/// A component factory that always reports construction failure. The
/// concrete input/output/ruleset/plugin/project runtimes are out of
/// scope for the core (§1); this stands in until a real factory set is
/// wired in, surfacing the gap as an ordinary verification/apply failure
/// rather than a panic.
pub struct UnimplementedFactory {
    label: &'static str,
}

impl UnimplementedFactory {
    /// Build a stand-in factory for `label` (used in its error text, e.g.
    /// `"input"`).
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

#[async_trait]
impl ComponentFactory for UnimplementedFactory {
    async fn verify(&self, _content: &str) -> Result<(), FactoryError> {
        Err(FactoryError::VerificationFailed(format!("no concrete {} factory configured", self.label)))
    }

    async fn build(&self, _id: &str, _content: &str) -> Result<Box<dyn ComponentInstance>, FactoryError> {
        Err(FactoryError::ConstructionFailed(format!("no concrete {} factory configured", self.label)))
    }
}

/// Adapts the leader-side `InstructionManager` to `LeaderVersionSource`,
/// the trait the heartbeat listener compares incoming heartbeats
/// against. A local newtype since neither type is defined in this crate
/// (orphan rule).
pub struct ManagerVersionSource<S> {
    manager: Arc<InstructionManager<S>>,
}

impl<S> ManagerVersionSource<S> {
    /// Wrap `manager` for use as a `LeaderVersionSource`.
    #[must_use]
    pub fn new(manager: Arc<InstructionManager<S>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<S: ClusterStore + 'static> LeaderVersionSource for ManagerVersionSource<S> {
    async fn current_version(&self) -> LeaderVersion {
        self.manager.current_version().await
    }

    fn is_compacting(&self) -> bool {
        self.manager.is_compacting()
    }
}
