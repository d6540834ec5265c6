// SPDX-License-Identifier: Apache-2.0
//! Key and channel name builders under the `cluster:` prefix (§6).

/// `cluster:leader_version`
#[must_use]
pub fn leader_version() -> String {
    "cluster:leader_version".to_string()
}

/// `cluster:instruction:<v>`
#[must_use]
pub fn instruction(version: u64) -> String {
    format!("cluster:instruction:{version}")
}

/// `cluster:heartbeat` pub/sub channel.
#[must_use]
pub fn heartbeat_channel() -> String {
    "cluster:heartbeat".to_string()
}

/// `cluster:sync_command` pub/sub channel.
#[must_use]
pub fn sync_command_channel() -> String {
    "cluster:sync_command".to_string()
}

/// `cluster:execution_flag:<node>`, 30s TTL.
#[must_use]
pub fn execution_flag(node_id: &str) -> String {
    format!("cluster:execution_flag:{node_id}")
}

/// `cluster:resync_required:<node>`, 24h TTL.
#[must_use]
pub fn resync_required(node_id: &str) -> String {
    format!("cluster:resync_required:{node_id}")
}

/// `cluster:known_nodes:<node>`, 48h TTL.
#[must_use]
pub fn known_nodes(node_id: &str) -> String {
    format!("cluster:known_nodes:{node_id}")
}

/// Prefix used to enumerate all instruction slots via `keys_by_pattern`.
#[must_use]
pub fn instruction_glob() -> String {
    "cluster:instruction:*".to_string()
}

/// Prefix used to enumerate all known-nodes keys via `keys_by_pattern`.
#[must_use]
pub fn known_nodes_glob() -> String {
    "cluster:known_nodes:*".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_the_documented_prefix() {
        assert_eq!(leader_version(), "cluster:leader_version");
        assert_eq!(instruction(7), "cluster:instruction:7");
        assert_eq!(execution_flag("node-1"), "cluster:execution_flag:node-1");
        assert_eq!(resync_required("node-1"), "cluster:resync_required:node-1");
        assert_eq!(known_nodes("node-1"), "cluster:known_nodes:node-1");
    }
}
