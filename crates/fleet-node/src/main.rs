// SPDX-License-Identifier: Apache-2.0
//! The cluster node daemon: wires the instruction log, heartbeat
//! protocol, sync listener, and pending-change manager into a runnable
//! leader-or-follower process (§5 task table).

mod adapters;
mod cli;
mod health;

use adapters::{ManagerVersionSource, NoopProjectCommandHandler, StaticLeaderLock, UnimplementedFactory, ZeroMetrics};
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Args, Role};
use fleet_app_core::config::ConfigService;
use fleet_config_fs::FsConfigStore;
use fleet_heartbeat::{EmitterConfig, HeartbeatListener};
use fleet_instructions::{boot, InstructionManager};
use fleet_pending::{NullScratchStore, PendingChangeManager};
use fleet_ports::{ComponentFactories, LeaderLock, NodeIdentity, NodeRole};
use fleet_registry::ComponentRegistry;
use fleet_store::RedisStore;
use fleet_sync::{FollowerState, SyncListener};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const NODE_ID_CONFIG_KEY: &str = "node_id";
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let node_id = resolve_node_id(args.node_id.clone())?;
    let store = Arc::new(RedisStore::connect(&args.store_url).await.context("connect to shared store")?);

    let registry = Arc::new(ComponentRegistry::new());
    let factories = Arc::new(ComponentFactories::new(
        Arc::new(UnimplementedFactory::new("input")),
        Arc::new(UnimplementedFactory::new("output")),
        Arc::new(UnimplementedFactory::new("ruleset")),
        Arc::new(UnimplementedFactory::new("plugin")),
        Arc::new(UnimplementedFactory::new("project")),
    ));
    let projects = Arc::new(NoopProjectCommandHandler);
    let stop = Arc::new(Notify::new());
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let initial_session = match args.role {
        Role::Leader => args.session.clone().unwrap_or_else(|| mint_id(8)),
        Role::Follower => "unsynced".to_string(),
    };
    let follower_state = Arc::new(FollowerState::new(initial_session.clone(), Arc::clone(&registry)));

    let sync_listener = Arc::new(SyncListener::new(
        Arc::clone(&store),
        Arc::clone(&follower_state),
        Arc::clone(&factories),
        Arc::clone(&projects),
        node_id.clone(),
    ));
    tasks.push(spawn_owned(Arc::clone(&sync_listener), Arc::clone(&stop), |listener, stop| async move {
        listener.run(stop).await;
    }));

    tasks.push(spawn_owned(
        (Arc::clone(&store), Arc::clone(&follower_state), node_id.clone()),
        Arc::clone(&stop),
        |(store, sync_state, node_id), stop| async move {
            fleet_heartbeat::run_emitter(store, sync_state, Arc::new(ZeroMetrics), EmitterConfig { node_id }, stop).await;
        },
    ));

    let role_label: &'static str = match args.role {
        Role::Leader => {
            let identity = NodeIdentity::new(node_id.clone(), NodeRole::Leader(Box::new(StaticLeaderLock)));
            if !identity.is_leader() {
                anyhow::bail!("leader lock not held immediately after acquisition");
            }

            let manager = Arc::new(InstructionManager::spawn(Arc::clone(&store), initial_session, node_id.clone(), 0));
            boot::initialize_on_boot(&manager, &store, &[], &[], 1000)
                .await
                .context("leader boot initialization")?;

            let version_source = Arc::new(ManagerVersionSource::new(Arc::clone(&manager)));
            let heartbeat_listener = Arc::new(HeartbeatListener::new(Arc::clone(&store), version_source));
            tasks.push(spawn_owned(Arc::clone(&heartbeat_listener), Arc::clone(&stop), |listener, stop| async move {
                listener.run(stop).await;
            }));
            tasks.push(spawn_owned(
                (Arc::clone(&store), heartbeat_listener.state()),
                Arc::clone(&stop),
                |(store, state), stop| async move {
                    fleet_heartbeat::run_sweeper(store, state, stop).await;
                },
            ));

            // Constructed so the pending-change workflow is wired end to
            // end; no operator API drives it here (out of scope, §1).
            let _pending_changes = Arc::new(PendingChangeManager::new(Arc::clone(&factories), Arc::clone(&registry), Arc::clone(&manager), NullScratchStore));

            tracing::info!(node_id = %node_id, "started as leader");
            "leader"
        }
        Role::Follower => {
            tracing::info!(node_id = %node_id, "started as follower");
            "follower"
        }
    };

    if let Some(health_addr) = args.health_addr {
        let status: Arc<dyn health::StatusSource> = Arc::clone(&follower_state) as Arc<dyn health::StatusSource>;
        let health_state = Arc::new(health::HealthState {
            node_id: node_id.clone(),
            role: role_label,
            status,
        });
        tasks.push(spawn_owned((health_addr, health_state), Arc::clone(&stop), |(addr, state), stop| async move {
            if let Err(err) = health::serve(addr, state, stop).await {
                tracing::error!(error = %err, "health endpoint exited with an error");
            }
        }));
    }

    tokio::signal::ctrl_c().await.context("install ctrl-c handler")?;
    tracing::info!("shutdown signal received, draining tasks");
    stop.notify_waiters();

    let drain = async {
        for task in tasks {
            let _ = task.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("graceful shutdown drain timed out, exiting anyway");
    }

    Ok(())
}

fn spawn_owned<T, F, Fut>(value: T, stop: Arc<Notify>, task: F) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnOnce(T, Arc<Notify>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(task(value, stop))
}

fn resolve_node_id(override_id: Option<String>) -> Result<String> {
    if let Some(id) = override_id {
        return Ok(id);
    }
    let store = FsConfigStore::new().context("open local config store")?;
    let service = ConfigService::new(store);
    if let Some(id) = service.load::<String>(NODE_ID_CONFIG_KEY)? {
        return Ok(id);
    }
    let id = mint_id(12);
    service.save(NODE_ID_CONFIG_KEY, &id)?;
    Ok(id)
}

fn mint_id(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}
