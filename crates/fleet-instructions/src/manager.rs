// SPDX-License-Identifier: Apache-2.0
//! The leader-side instruction manager (§4.D): serialises publishing,
//! runs compaction, signals `publish_complete`, and exposes the ports
//! consumed by the heartbeat manager and pending-change workflow.
//!
//! Single-writer discipline (§9's "single-writer publish queue" design
//! note) is enforced two ways, layered: a bounded `mpsc` queue drained by
//! one spawned worker gives FIFO ordering and backpressure under normal
//! load; a shared `tokio::sync::Mutex` around the actual publish
//! algorithm is what *guarantees* mutual exclusion, and is also what the
//! saturation fallback path (§7) locks directly when the queue is full,
//! trading strict FIFO order for availability under overload.

use crate::compaction;
use crate::error::InstructionError;
use crate::followers::{self, WAIT_FOR_IDLE_TIMEOUT};
use crate::log::InstructionLog;
use crate::util::now_secs;
use fleet_proto::{Instruction, LeaderVersion, SyncAction, SyncCommand};
use fleet_store::{keys, ClusterStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

const PUBLISH_QUEUE_CAPACITY: usize = 64;
const HISTORY_CAPACITY: usize = 50;

/// The outcome of one publish attempt, kept for operator visibility
/// (§4.D step 8).
#[derive(Debug, Clone)]
pub enum OperationOutcome {
    /// The instruction was published and compaction completed.
    Published(LeaderVersion),
    /// Compaction failed and was rolled back; the message is the error.
    Failed(String),
}

/// One recorded publish attempt.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// When the attempt was recorded.
    pub timestamp: i64,
    /// Its outcome.
    pub outcome: OperationOutcome,
}

struct WorkerState<S> {
    store: Arc<S>,
    log: InstructionLog<S>,
    current: LeaderVersion,
    history: VecDeque<OperationRecord>,
}

impl<S: ClusterStore> WorkerState<S> {
    fn record(&mut self, outcome: OperationOutcome) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(OperationRecord {
            timestamp: now_secs(),
            outcome,
        });
    }

    /// Run the full publish algorithm (§4.D steps 1-8) for `instruction`.
    async fn publish(
        &mut self,
        mut instruction: Instruction,
        node_id: &str,
        compacting: &AtomicBool,
    ) -> Result<LeaderVersion, InstructionError> {
        let old_counter = self.current.counter;

        let stragglers = followers::wait_for_followers_idle(&*self.store, node_id, WAIT_FOR_IDLE_TIMEOUT).await;
        for straggler in &stragglers {
            if let Err(err) = followers::kick_follower_for_resync(&*self.store, straggler).await {
                tracing::warn!(straggler, error = %err, "failed to kick straggling follower");
            }
        }

        compacting.store(true, Ordering::SeqCst);
        let compacting_version = self.current.with_counter(0);
        if let Err(err) = self.log.set_leader_version(&compacting_version).await {
            compacting.store(false, Ordering::SeqCst);
            self.record(OperationOutcome::Failed(err.to_string()));
            return Err(err);
        }

        let result = self.rewrite_log(old_counter, &mut instruction).await;
        compacting.store(false, Ordering::SeqCst);

        match result {
            Ok(new_version) => {
                self.current = new_version.clone();
                self.record(OperationOutcome::Published(new_version.clone()));
                self.publish_complete(&new_version).await;
                Ok(new_version)
            }
            Err(err) => {
                self.record(OperationOutcome::Failed(err.to_string()));
                if let Err(rollback_err) = self.log.set_leader_version(&self.current).await {
                    tracing::error!(error = %rollback_err, "failed to roll back leader_version after a failed compaction");
                }
                Err(err)
            }
        }
    }

    async fn rewrite_log(
        &self,
        old_counter: u64,
        instruction: &mut Instruction,
    ) -> Result<LeaderVersion, InstructionError> {
        let mut live = Vec::new();
        for version in 1..=old_counter {
            if let Some(slot) = self.log.get(version).await? {
                if let Some(instr) = slot.instruction() {
                    live.push(instr.clone());
                }
            }
        }

        let new_version = old_counter + 1;
        instruction.version = new_version;
        instruction.timestamp = now_secs();
        live.push(instruction.clone());

        let compacted = compaction::versions_to_compact(&live);
        for entry in &live {
            if compacted.contains(&entry.version) {
                self.log.write_marker(entry.version).await?;
            } else {
                self.log.append(entry).await?;
            }
        }

        Ok(self.current.with_counter(new_version))
    }

    async fn publish_complete(&self, version: &LeaderVersion) {
        let command = SyncCommand::broadcast(SyncAction::PublishComplete, version.clone(), now_secs());
        match serde_json::to_string(&command) {
            Ok(payload) => {
                if let Err(err) = self.store.publish(&keys::sync_command_channel(), &payload).await {
                    tracing::warn!(error = %err, "failed to publish publish_complete");
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to serialize publish_complete"),
        }
    }
}

struct PublishRequest {
    instruction: Instruction,
    reply: oneshot::Sender<Result<LeaderVersion, InstructionError>>,
}

/// Leader-side handle to the instruction log: publish, query, and
/// follower-eviction ports (§6).
pub struct InstructionManager<S> {
    state: Arc<Mutex<WorkerState<S>>>,
    compacting: Arc<AtomicBool>,
    tx: mpsc::Sender<PublishRequest>,
    store: Arc<S>,
    node_id: String,
    session: String,
}

impl<S: ClusterStore + 'static> InstructionManager<S> {
    /// Spawn the publish worker and return a handle to it. `initial_counter`
    /// is the leader's starting counter for `session` (0 for a brand new
    /// session).
    pub fn spawn(store: Arc<S>, session: String, node_id: String, initial_counter: u64) -> Self {
        let log = InstructionLog::new(Arc::clone(&store));
        let state = Arc::new(Mutex::new(WorkerState {
            store: Arc::clone(&store),
            log,
            current: LeaderVersion {
                session: session.clone(),
                counter: initial_counter,
            },
            history: VecDeque::new(),
        }));
        let compacting = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel::<PublishRequest>(PUBLISH_QUEUE_CAPACITY);

        let worker_state = Arc::clone(&state);
        let worker_compacting = Arc::clone(&compacting);
        let worker_node_id = node_id.clone();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let mut guard = worker_state.lock().await;
                let result = guard.publish(request.instruction, &worker_node_id, &worker_compacting).await;
                drop(guard);
                let _ = request.reply.send(result);
            }
        });

        Self {
            state,
            compacting,
            tx,
            store,
            node_id,
            session,
        }
    }

    /// This node's id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The leader session this manager is publishing under.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Submit `instruction` for publish (§6 `PublishInstruction`). Queues
    /// behind the single-writer worker under normal load; if the queue is
    /// saturated, falls back once to direct processing under the same
    /// mutex (§7) rather than rejecting the caller outright.
    pub async fn publish_instruction(&self, instruction: Instruction) -> Result<LeaderVersion, InstructionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = PublishRequest {
            instruction,
            reply: reply_tx,
        };
        match self.tx.try_send(request) {
            Ok(()) => reply_rx.await.map_err(|_| InstructionError::WorkerGone)?,
            Err(mpsc::error::TrySendError::Full(request)) => {
                tracing::warn!(node_id = %self.node_id, "publish queue saturated, falling back to direct processing");
                let mut guard = self.state.lock().await;
                guard.publish(request.instruction, &self.node_id, &self.compacting).await
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(InstructionError::WorkerGone),
        }
    }

    /// The current leader version (§6 `GetCurrentVersion`).
    pub async fn current_version(&self) -> LeaderVersion {
        self.state.lock().await.current.clone()
    }

    /// `true` while a publish is between steps 2 and 6 of §4.D (§6
    /// `IsCompacting`).
    #[must_use]
    pub fn is_compacting(&self) -> bool {
        self.compacting.load(Ordering::SeqCst)
    }

    /// Every follower node id the leader has observed, excluding itself
    /// (§6 `GetActiveFollowers`).
    pub async fn active_followers(&self) -> Result<Vec<String>, InstructionError> {
        followers::active_followers(&*self.store, &self.node_id)
            .await
            .map_err(InstructionError::StoreExhausted)
    }

    /// Force `node_id` into a full resync (§6 `KickFollowerForResync`).
    pub async fn kick_follower_for_resync(&self, node_id: &str) -> Result<(), InstructionError> {
        followers::kick_follower_for_resync(&*self.store, node_id)
            .await
            .map_err(InstructionError::StoreExhausted)
    }

    /// A snapshot of recent publish attempts, most recent last.
    pub async fn recent_operations(&self) -> Vec<OperationRecord> {
        self.state.lock().await.history.iter().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use fleet_proto::{ComponentType, Metadata, Operation};
    use fleet_store::FakeStore;

    fn add(component_type: ComponentType, name: &str) -> Instruction {
        Instruction::new(0, component_type, name, "{}", Operation::Add, vec![], Metadata::new(), 0)
    }

    #[tokio::test]
    async fn publish_advances_the_counter_and_assigns_the_new_version() {
        let store = Arc::new(FakeStore::new());
        let manager = InstructionManager::spawn(store, "sess1".to_string(), "leader".to_string(), 0);

        let version = manager.publish_instruction(add(ComponentType::Input, "i1")).await.unwrap();
        assert_eq!(version, LeaderVersion { session: "sess1".to_string(), counter: 1 });
        assert_eq!(manager.current_version().await.counter, 1);
        assert!(!manager.is_compacting());
    }

    #[tokio::test]
    async fn publishing_an_update_compacts_the_earlier_add() {
        let store = Arc::new(FakeStore::new());
        let manager = InstructionManager::spawn(store, "sess1".to_string(), "leader".to_string(), 0);

        manager.publish_instruction(add(ComponentType::Ruleset, "r1")).await.unwrap();
        let update = Instruction::new(0, ComponentType::Ruleset, "r1", "{}", Operation::Update, vec![], Metadata::new(), 0);
        let version = manager.publish_instruction(update).await.unwrap();
        assert_eq!(version.counter, 2);

        let log = InstructionLog::new(manager.store.clone());
        let slot_one = log.get(1).await.unwrap().unwrap();
        assert!(slot_one.is_marker());
        let slot_two = log.get(2).await.unwrap().unwrap();
        assert!(!slot_two.is_marker());
    }

    #[tokio::test]
    async fn recent_operations_records_a_successful_publish() {
        let store = Arc::new(FakeStore::new());
        let manager = InstructionManager::spawn(store, "sess1".to_string(), "leader".to_string(), 0);
        manager.publish_instruction(add(ComponentType::Input, "i1")).await.unwrap();
        let history = manager.recent_operations().await;
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0].outcome, OperationOutcome::Published(_)));
    }

    #[tokio::test]
    async fn active_followers_excludes_this_node() {
        let store = Arc::new(FakeStore::new());
        store.set(&keys::known_nodes("leader"), "1").await.unwrap();
        store.set(&keys::known_nodes("f1"), "1").await.unwrap();
        let manager = InstructionManager::spawn(store, "sess1".to_string(), "leader".to_string(), 0);
        assert_eq!(manager.active_followers().await.unwrap(), vec!["f1".to_string()]);
    }
}
