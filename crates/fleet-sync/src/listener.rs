// SPDX-License-Identifier: Apache-2.0
//! The sync listener (§4.F): subscribes to `cluster:sync_command`,
//! ignoring messages targeted at a different node, and replays new
//! instructions through the two-phase `SyncInstructions` algorithm.

use crate::apply::apply_instruction;
use crate::cleanup::cleanup_all;
use crate::error::SyncError;
use crate::state::FollowerState;
use fleet_instructions::InstructionLog;
use fleet_ports::{ComponentFactories, ProjectCommandHandler};
use fleet_proto::{ComponentType, LeaderVersion, LogSlot, SyncCommand};
use fleet_registry::ComponentRegistry;
use fleet_store::{keys, ClusterStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

const COMPACTION_POLL_INTERVAL: Duration = Duration::from_secs(1);
const COMPACTION_POLL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const EXECUTION_FLAG_TTL: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Subscribes to sync commands and drives `SyncInstructions` for this
/// node.
pub struct SyncListener<S, P> {
    store: Arc<S>,
    log: InstructionLog<S>,
    state: Arc<FollowerState>,
    factories: Arc<ComponentFactories>,
    projects: Arc<P>,
    node_id: String,
}

impl<S: ClusterStore + 'static, P: ProjectCommandHandler> SyncListener<S, P> {
    /// Build a listener over `state`'s registry, replaying through
    /// `factories` and delegating project lifecycle actions to `projects`.
    #[must_use]
    pub fn new(store: Arc<S>, state: Arc<FollowerState>, factories: Arc<ComponentFactories>, projects: Arc<P>, node_id: impl Into<String>) -> Self {
        let log = InstructionLog::new(Arc::clone(&store));
        Self {
            store,
            log,
            state,
            factories,
            projects,
            node_id: node_id.into(),
        }
    }

    /// This listener's follower state, shared with the heartbeat emitter.
    #[must_use]
    pub fn follower_state(&self) -> Arc<FollowerState> {
        Arc::clone(&self.state)
    }

    /// Run the subscribe loop until `stop` is notified or the
    /// subscription closes permanently.
    pub async fn run(&self, stop: Arc<Notify>) {
        let mut sub = match self.store.subscribe(&keys::sync_command_channel()).await {
            Ok(sub) => sub,
            Err(err) => {
                tracing::error!(error = %err, "failed to subscribe to sync command channel");
                return;
            }
        };
        loop {
            tokio::select! {
                () = stop.notified() => {
                    tracing::info!("sync listener stopping");
                    return;
                }
                msg = sub.recv() => {
                    match msg {
                        Some(payload) => self.handle_payload(&payload).await,
                        None => {
                            tracing::warn!("sync command subscription closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_payload(&self, payload: &str) {
        let command: SyncCommand = match serde_json::from_str(payload) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(error = %err, "malformed sync command payload");
                return;
            }
        };
        if !command.applies_to(&self.node_id) {
            return;
        }
        if let Err(err) = self.sync(command.leader_version).await {
            tracing::warn!(error = %err, "sync failed, will retry on the next command");
        }
    }

    async fn sync(&self, target: LeaderVersion) -> Result<(), SyncError> {
        sync_instructions(
            &*self.store,
            &self.log,
            &self.state,
            &self.state.registry(),
            &self.factories,
            &*self.projects,
            &self.node_id,
            target,
        )
        .await
    }
}

/// `SyncInstructions(target_version)` (§4.F steps 1-7): wait out a
/// mid-compaction leader, refresh the execution flag, adopt a new session
/// if one was observed, read and apply every real instruction in
/// `(local_counter, target_counter]`, and on any corruption or apply
/// failure clean up, reset, and return a retryable error.
pub async fn sync_instructions<S, P>(
    store: &S,
    log: &InstructionLog<S>,
    state: &FollowerState,
    registry: &ComponentRegistry,
    factories: &ComponentFactories,
    projects: &P,
    node_id: &str,
    target: LeaderVersion,
) -> Result<(), SyncError>
where
    S: ClusterStore,
    P: ProjectCommandHandler,
{
    let target = if target.counter == 0 {
        wait_out_compaction(log, target).await?
    } else {
        target
    };

    store.set_ex(&keys::execution_flag(node_id), "executing", EXECUTION_FLAG_TTL).await?;

    let local_session = state.session().await;
    if target.session != local_session {
        cleanup_all(registry, projects).await;
        state.adopt_session(&target.session).await;
    }

    let local_counter = state.counter().await;
    let mut reals = Vec::new();
    let mut missing = Vec::new();
    for version in (local_counter + 1)..=target.counter {
        match log.get(version).await? {
            Some(LogSlot::Instruction(instruction)) => reals.push(instruction),
            Some(LogSlot::Marker(_)) => {}
            None => missing.push(version),
        }
    }
    store.del(&keys::execution_flag(node_id)).await?;

    if !missing.is_empty() {
        cleanup_all(registry, projects).await;
        state.adopt_session(&target.session).await;
        sleep(RETRY_DELAY).await;
        return Err(SyncError::MissingInstructions(missing));
    }

    // Stable sort: projects last, real instructions otherwise already in
    // ascending version order from the read loop above (§4.F step 6, §9
    // "two phase shape").
    reals.sort_by_key(|instruction| instruction.component_type == ComponentType::Project);

    for instruction in &reals {
        if let Err(err) = apply_instruction(instruction, registry, factories, projects).await {
            tracing::warn!(version = instruction.version, error = %err, "failed to apply instruction during sync");
            cleanup_all(registry, projects).await;
            state.adopt_session(&target.session).await;
            sleep(RETRY_DELAY).await;
            return Err(SyncError::ApplyFailed(instruction.version));
        }
    }

    state.set_counter(target.counter).await;
    Ok(())
}

async fn wait_out_compaction<S: ClusterStore>(log: &InstructionLog<S>, target: LeaderVersion) -> Result<LeaderVersion, SyncError> {
    let mut current = target;
    let mut elapsed = Duration::ZERO;
    while current.counter == 0 && elapsed < COMPACTION_POLL_TIMEOUT {
        sleep(COMPACTION_POLL_INTERVAL).await;
        elapsed += COMPACTION_POLL_INTERVAL;
        if let Some(version) = log.get_leader_version().await? {
            current = version;
        }
    }
    Ok(current)
}
