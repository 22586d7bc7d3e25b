//! Node planning types
//!
//! A run is planned up front as a list of [`NodeSpec`]s: at most one
//! membership service followed by the peers in ascending index order.

use std::fmt;

/// Identifier of the membership (certificate authority) process
pub const MEMBER_SERVICE_ID: &str = "membersrvc";

/// Prefix of peer identifiers (`vp0`, `vp1`, ...)
pub const PEER_ID_PREFIX: &str = "vp";

/// Well-known membership service port.
///
/// The membership service always listens here, whatever port was reserved
/// for its primary slot. The reserved port is discarded and this constant is
/// substituted. Downstream tooling may rely on the fixed value.
pub const MEMBER_SERVICE_PORT: u16 = 7054;

/// Role a node plays in the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Membership / certificate authority service
    MemberService,
    /// Ledger validating peer
    Peer,
}

/// Planned node
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeSpec {
    role: NodeRole,
    index: Option<usize>,
    id: String,
}

impl NodeSpec {
    pub fn member_service() -> Self {
        NodeSpec {
            role: NodeRole::MemberService,
            index: None,
            id: MEMBER_SERVICE_ID.to_string(),
        }
    }

    pub fn peer(index: usize) -> Self {
        NodeSpec {
            role: NodeRole::Peer,
            index: Some(index),
            id: format!("{}{}", PEER_ID_PREFIX, index),
        }
    }

    /// Plan a whole network: the membership service first (if requested),
    /// then `peer_count` peers in ascending index order.
    pub fn plan(peer_count: usize, with_member_service: bool) -> Vec<NodeSpec> {
        let mut nodes = Vec::with_capacity(peer_count + 1);
        if with_member_service {
            nodes.push(NodeSpec::member_service());
        }
        nodes.extend((0..peer_count).map(NodeSpec::peer));
        nodes
    }

    #[inline]
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Peer index (None for the membership service)
    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn is_peer(&self) -> bool {
        self.role == NodeRole::Peer
    }

    /// The discovery root is peer 0; every other peer bootstraps from it
    #[inline]
    pub fn is_discovery_root(&self) -> bool {
        self.index == Some(0)
    }
}

impl fmt::Display for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Lifecycle of a node during a bootstrap run
///
/// `Planned → PortsReserved → Launched → AwaitingReady → Ready | TimedOut`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Planned,
    PortsReserved,
    Launched,
    AwaitingReady,
    Ready,
    TimedOut,
}

impl NodeState {
    /// Whether `next` directly follows this state
    pub fn can_advance_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Planned, NodeState::PortsReserved)
                | (NodeState::PortsReserved, NodeState::Launched)
                | (NodeState::Launched, NodeState::AwaitingReady)
                | (NodeState::AwaitingReady, NodeState::Ready)
                | (NodeState::AwaitingReady, NodeState::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Ready | NodeState::TimedOut)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Planned => "planned",
            NodeState::PortsReserved => "ports-reserved",
            NodeState::Launched => "launched",
            NodeState::AwaitingReady => "awaiting-ready",
            NodeState::Ready => "ready",
            NodeState::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}
