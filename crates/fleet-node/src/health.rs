// SPDX-License-Identifier: Apache-2.0
//! The optional `/healthz` liveness endpoint (§6 "Supplemented, ambient"):
//! off by default, bound only when `--health-addr` is given. Not the
//! rule-hub's operator HTTP API (out of scope, §1) — a minimal probe any
//! deployed daemon in this style carries.

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use fleet_instructions::InstructionManager;
use fleet_store::ClusterStore;
use fleet_sync::FollowerState;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Reports this node's current `(session, counter)`, regardless of
/// whether it's backed by the leader's instruction manager or a
/// follower's replay position.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// The session and highest fully-applied (or published) counter.
    async fn session_and_counter(&self) -> (String, u64);
}

#[async_trait]
impl<S: ClusterStore + 'static> StatusSource for InstructionManager<S> {
    async fn session_and_counter(&self) -> (String, u64) {
        let version = self.current_version().await;
        (version.session, version.counter)
    }
}

#[async_trait]
impl StatusSource for FollowerState {
    async fn session_and_counter(&self) -> (String, u64) {
        (self.session().await, self.counter().await)
    }
}

/// Shared state the `/healthz` handler reads from.
pub struct HealthState {
    /// This node's id.
    pub node_id: String,
    /// `"leader"` or `"follower"`, reported verbatim.
    pub role: &'static str,
    /// Where to read the current session/counter from.
    pub status: Arc<dyn StatusSource>,
}

#[derive(Serialize)]
struct HealthBody {
    node_id: String,
    role: &'static str,
    session: String,
    counter: u64,
}

async fn healthz(State(state): State<Arc<HealthState>>) -> Json<HealthBody> {
    let (session, counter) = state.status.session_and_counter().await;
    Json(HealthBody {
        node_id: state.node_id.clone(),
        role: state.role,
        session,
        counter,
    })
}

/// Serve `/healthz` on `addr` until `stop` is notified.
pub async fn serve(addr: SocketAddr, state: Arc<HealthState>, stop: Arc<Notify>) -> anyhow::Result<()> {
    let app = Router::new().route("/healthz", get(healthz)).with_state(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health endpoint listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.notified().await })
        .await?;
    Ok(())
}
