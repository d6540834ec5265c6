// SPDX-License-Identifier: Apache-2.0
//! The construction/teardown contract each component type (input, output,
//! ruleset, plugin, project) provides. Concrete component runtimes are out
//! of scope for this crate (§1); this is the seam they plug into.

use async_trait::async_trait;
use fleet_proto::ComponentType;
use thiserror::Error;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Error verifying or constructing a component instance.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// `content` failed the component type's own validation.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    /// Construction failed after verification passed (e.g. a resource the
    /// component needs at runtime couldn't be acquired).
    #[error("construction failed: {0}")]
    ConstructionFailed(String),
}

/// An opaque, live component instance. The registry (§4.H) holds these;
/// it never inspects them beyond dropping them to tear them down.
pub trait ComponentInstance: Any + Send + Sync {
    /// Support downcasting for collaborators that need the concrete type
    /// back (e.g. a project runtime that must look up its input handles).
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentInstance")
    }
}

/// The construction/verification contract a component type provides.
/// Exactly one factory exists per `ComponentType` in a running node.
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    /// Validate `content` without constructing anything. Used by the
    /// pending-change workflow (§4.G) ahead of publish.
    async fn verify(&self, content: &str) -> Result<(), FactoryError>;

    /// Construct a live instance named `id` from `content`. Callers must
    /// have verified `content` first (or accept that construction may
    /// fail redundantly re-surfacing a verification error).
    async fn build(&self, id: &str, content: &str) -> Result<Box<dyn ComponentInstance>, FactoryError>;
}

/// One `ComponentFactory` per `ComponentType` (§6: "Verify/New per
/// component type"), the seam both the sync listener and the
/// pending-change manager construct/verify components through.
pub struct ComponentFactories {
    inputs: Arc<dyn ComponentFactory>,
    outputs: Arc<dyn ComponentFactory>,
    rulesets: Arc<dyn ComponentFactory>,
    plugins: Arc<dyn ComponentFactory>,
    projects: Arc<dyn ComponentFactory>,
}

impl ComponentFactories {
    /// Build the factory set from one factory per component type.
    #[must_use]
    pub fn new(
        inputs: Arc<dyn ComponentFactory>,
        outputs: Arc<dyn ComponentFactory>,
        rulesets: Arc<dyn ComponentFactory>,
        plugins: Arc<dyn ComponentFactory>,
        projects: Arc<dyn ComponentFactory>,
    ) -> Self {
        Self {
            inputs,
            outputs,
            rulesets,
            plugins,
            projects,
        }
    }

    /// The factory responsible for `component_type`.
    #[must_use]
    pub fn get(&self, component_type: ComponentType) -> &Arc<dyn ComponentFactory> {
        match component_type {
            ComponentType::Input => &self.inputs,
            ComponentType::Output => &self.outputs,
            ComponentType::Ruleset => &self.rulesets,
            ComponentType::Plugin => &self.plugins,
            ComponentType::Project => &self.projects,
        }
    }
}
