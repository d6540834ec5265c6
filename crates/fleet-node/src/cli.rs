// SPDX-License-Identifier: Apache-2.0
//! Command-line configuration for the node daemon.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// Whether this process should come up acting as leader or follower.
/// Leader election itself is out of scope (§1) — this is an operator
/// hint, not a negotiated role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Acts as leader: publishes instructions, runs compaction, listens
    /// for heartbeats.
    Leader,
    /// Acts as follower: emits heartbeats, replays instructions.
    Follower,
}

/// CLI configuration for `fleet-node`.
#[derive(Debug, Parser)]
#[command(author, version, about = "Cluster coordination core node daemon")]
pub struct Args {
    /// URL of the shared key/value + pub/sub store (e.g. `redis://127.0.0.1:6379/0`).
    #[arg(long, default_value = "redis://127.0.0.1:6379/0")]
    pub store_url: String,

    /// This node's id. If omitted, a cached id is read from (or minted
    /// into) the local config directory.
    #[arg(long)]
    pub node_id: Option<String>,

    /// Whether to come up as leader or follower.
    #[arg(long, value_enum)]
    pub role: Role,

    /// Leader session id. Required when `--role leader`; ignored otherwise.
    /// If omitted, a fresh session id is minted.
    #[arg(long)]
    pub session: Option<String>,

    /// Bind address for the optional `/healthz` liveness endpoint. If
    /// omitted, no HTTP listener is started.
    #[arg(long)]
    pub health_addr: Option<SocketAddr>,
}
