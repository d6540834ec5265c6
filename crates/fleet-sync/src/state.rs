// SPDX-License-Identifier: Apache-2.0
//! A follower's local replay position: `(session, counter)` plus the
//! registry it's building. Implements `fleet_heartbeat::FollowerSyncState`
//! so the heartbeat emitter can report this follower's version and force
//! a resync on an observed flag (§4.E follower self-eviction).

use async_trait::async_trait;
use fleet_heartbeat::FollowerSyncState;
use fleet_proto::LeaderVersion;
use fleet_registry::ComponentRegistry;
use std::sync::Arc;
use tokio::sync::Mutex;

struct Local {
    session: String,
    counter: u64,
}

/// Shared, mutex-guarded replay position for one follower process.
pub struct FollowerState {
    registry: Arc<ComponentRegistry>,
    local: Mutex<Local>,
}

impl FollowerState {
    /// A fresh follower state at `counter=0` under `initial_session` (the
    /// session placeholder adopted until the first sync command arrives).
    #[must_use]
    pub fn new(initial_session: impl Into<String>, registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            local: Mutex::new(Local {
                session: initial_session.into(),
                counter: 0,
            }),
        }
    }

    /// The registry this follower's sync listener builds.
    #[must_use]
    pub fn registry(&self) -> Arc<ComponentRegistry> {
        Arc::clone(&self.registry)
    }

    /// The session this follower currently believes is live.
    pub async fn session(&self) -> String {
        self.local.lock().await.session.clone()
    }

    /// The highest version fully applied under the current session.
    pub async fn counter(&self) -> u64 {
        self.local.lock().await.counter
    }

    /// Advance the counter after a successful sync pass.
    pub async fn set_counter(&self, counter: u64) {
        self.local.lock().await.counter = counter;
    }

    /// Adopt a new session (observed session change, §4.F step 3): clear
    /// the registry and reset the counter to 0. Callers are responsible
    /// for running the complete cleanup procedure before calling this, so
    /// it only updates bookkeeping.
    pub async fn adopt_session(&self, session: impl Into<String>) {
        let mut local = self.local.lock().await;
        local.session = session.into();
        local.counter = 0;
    }
}

#[async_trait]
impl FollowerSyncState for FollowerState {
    async fn current_version(&self) -> LeaderVersion {
        let local = self.local.lock().await;
        LeaderVersion {
            session: local.session.clone(),
            counter: local.counter,
        }
    }

    async fn force_resync(&self) {
        self.registry.clear_all();
        let mut local = self.local.lock().await;
        local.counter = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_at_counter_zero_under_the_initial_session() {
        let state = FollowerState::new("sess1", Arc::new(ComponentRegistry::new()));
        assert_eq!(state.session().await, "sess1");
        assert_eq!(state.counter().await, 0);
    }

    #[tokio::test]
    async fn set_counter_advances_current_version() {
        let state = FollowerState::new("sess1", Arc::new(ComponentRegistry::new()));
        state.set_counter(7).await;
        let version = state.current_version().await;
        assert_eq!(version.session, "sess1");
        assert_eq!(version.counter, 7);
    }

    #[tokio::test]
    async fn adopt_session_resets_the_counter() {
        let state = FollowerState::new("sess1", Arc::new(ComponentRegistry::new()));
        state.set_counter(9).await;
        state.adopt_session("sess2").await;
        assert_eq!(state.session().await, "sess2");
        assert_eq!(state.counter().await, 0);
    }

    #[tokio::test]
    async fn force_resync_clears_the_registry_and_resets_the_counter() {
        use fleet_proto::ComponentType;
        use std::any::Any;

        struct Stub;
        impl fleet_ports::ComponentInstance for Stub {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let registry = Arc::new(ComponentRegistry::new());
        registry.set(ComponentType::Input, "i1", Arc::new(Stub));
        let state = FollowerState::new("sess1", Arc::clone(&registry));
        state.set_counter(5).await;

        state.force_resync().await;

        assert_eq!(state.counter().await, 0);
        assert_eq!(state.session().await, "sess1");
        assert!(!registry.contains(ComponentType::Input, "i1"));
    }
}
