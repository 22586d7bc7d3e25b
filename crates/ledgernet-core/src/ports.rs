//! Service endpoints of a node

use std::fmt;
use std::net::SocketAddr;

/// Number of ports reserved for every node
pub const PORTS_PER_NODE: usize = 5;

/// Named service slot of a node's port set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceRole {
    /// Primary RPC (gRPC) endpoint
    Grpc,
    /// REST endpoint, used for readiness
    Rest,
    /// Event stream endpoint
    Events,
    /// CLI callback endpoint
    Cli,
    /// Profiling endpoint
    Profile,
}

impl ServiceRole {
    /// All roles in slot order
    pub const ALL: [ServiceRole; PORTS_PER_NODE] = [
        ServiceRole::Grpc,
        ServiceRole::Rest,
        ServiceRole::Events,
        ServiceRole::Cli,
        ServiceRole::Profile,
    ];

    #[inline]
    pub fn slot(self) -> usize {
        match self {
            ServiceRole::Grpc => 0,
            ServiceRole::Rest => 1,
            ServiceRole::Events => 2,
            ServiceRole::Cli => 3,
            ServiceRole::Profile => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ServiceRole::Grpc => "grpc",
            ServiceRole::Rest => "rest",
            ServiceRole::Events => "events",
            ServiceRole::Cli => "cli",
            ServiceRole::Profile => "profile",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five addresses reserved for one node, one per [`ServiceRole`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortSet {
    addrs: [SocketAddr; PORTS_PER_NODE],
}

impl PortSet {
    /// Build from addresses in slot order
    pub fn new(addrs: [SocketAddr; PORTS_PER_NODE]) -> Self {
        PortSet { addrs }
    }

    #[inline]
    pub fn get(&self, role: ServiceRole) -> SocketAddr {
        self.addrs[role.slot()]
    }

    #[inline]
    pub fn grpc(&self) -> SocketAddr {
        self.get(ServiceRole::Grpc)
    }

    #[inline]
    pub fn rest(&self) -> SocketAddr {
        self.get(ServiceRole::Rest)
    }

    #[inline]
    pub fn events(&self) -> SocketAddr {
        self.get(ServiceRole::Events)
    }

    #[inline]
    pub fn cli(&self) -> SocketAddr {
        self.get(ServiceRole::Cli)
    }

    #[inline]
    pub fn profile(&self) -> SocketAddr {
        self.get(ServiceRole::Profile)
    }

    /// Iterate `(role, address)` in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ServiceRole, SocketAddr)> + '_ {
        ServiceRole::ALL.iter().map(move |role| (*role, self.get(*role)))
    }

    /// Whether any address of `self` also appears in `other`
    pub fn overlaps(&self, other: &PortSet) -> bool {
        self.addrs.iter().any(|a| other.addrs.contains(a))
    }
}
