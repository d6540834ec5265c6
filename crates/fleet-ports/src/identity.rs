// SPDX-License-Identifier: Apache-2.0
//! Node identity and the externally-held leader lock (§4.B).

/// An externally-held distributed lock granting this process the leader
/// role. Acquisition, renewal, and loss detection are out of scope here
/// (§1): this crate only observes whether the lock is currently held.
/// Losing it is fatal to the leader process (§7) — callers should treat
/// `is_held() == false` on a process that believed itself leader as a
/// signal to exit.
pub trait LeaderLock: Send + Sync {
    /// Whether this process currently holds the leader lock.
    fn is_held(&self) -> bool;
}

/// Whether this node is currently acting as leader or follower.
pub enum NodeRole {
    /// Acting as leader, backed by an externally-held lock.
    Leader(Box<dyn LeaderLock>),
    /// Acting as follower.
    Follower,
}

/// A node's local identity: its id and its current role.
pub struct NodeIdentity {
    id: String,
    role: NodeRole,
}

impl NodeIdentity {
    /// Build a node identity for `id` in `role`.
    #[must_use]
    pub fn new(id: impl Into<String>, role: NodeRole) -> Self {
        Self { id: id.into(), role }
    }

    /// This node's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `true` if this node is currently leader (i.e. it holds the leader
    /// lock). A leader whose lock has been lost reports `false` here.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        match &self.role {
            NodeRole::Leader(lock) => lock.is_held(),
            NodeRole::Follower => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct AlwaysHeld;
    impl LeaderLock for AlwaysHeld {
        fn is_held(&self) -> bool {
            true
        }
    }

    struct NeverHeld;
    impl LeaderLock for NeverHeld {
        fn is_held(&self) -> bool {
            false
        }
    }

    #[test]
    fn follower_is_never_leader() {
        let node = NodeIdentity::new("n1", NodeRole::Follower);
        assert!(!node.is_leader());
    }

    #[test]
    fn leader_with_lost_lock_reports_not_leader() {
        let node = NodeIdentity::new("n1", NodeRole::Leader(Box::new(NeverHeld)));
        assert!(!node.is_leader());
        let node = NodeIdentity::new("n1", NodeRole::Leader(Box::new(AlwaysHeld)));
        assert!(node.is_leader());
    }
}
