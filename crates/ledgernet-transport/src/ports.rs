//! Ephemeral port reservation
//!
//! Every port is reserved by binding a listening socket to port 0 and keeping
//! it open, so the OS cannot hand the same port to a later reservation in this
//! run. The sockets are closed right before the owning process is spawned,
//! which leaves a short window in which another program could take the port.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr, TcpListener};

use ledgernet_core::{NetError, NetResult, PortSet, PORTS_PER_NODE};

/// Ports held open for one node
#[derive(Debug)]
pub struct ReservedPorts {
    ports: PortSet,
    listeners: Vec<TcpListener>,
}

impl ReservedPorts {
    /// Addresses the node will bind to
    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Close the held sockets so the real server can bind
    pub fn release(self) -> PortSet {
        let ReservedPorts { ports, listeners } = self;
        drop(listeners);
        tracing::debug!(grpc = %ports.grpc(), rest = %ports.rest(), "released reserved ports");
        ports
    }
}

/// Port sets for a whole network
#[derive(Debug)]
pub struct NetworkPorts {
    /// Ports set aside for the membership service
    pub member_service: Option<ReservedPorts>,

    /// Peer ports in index order
    pub peers: Vec<ReservedPorts>,
}

/// Reserves globally unique ports on one interface
pub struct PortAllocator {
    host: IpAddr,
    handed_out: HashSet<SocketAddr>,
}

impl PortAllocator {
    /// Create an allocator for an interface
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            handed_out: HashSet::new(),
        }
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Number of ports reserved so far
    pub fn reserved_count(&self) -> usize {
        self.handed_out.len()
    }

    fn reserve_port(&mut self) -> NetResult<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(SocketAddr::new(self.host, 0)).map_err(|e| {
            NetError::PortReservation {
                host: self.host.to_string(),
                reason: e.to_string(),
            }
        })?;
        let addr = listener.local_addr().map_err(|e| NetError::PortReservation {
            host: self.host.to_string(),
            reason: e.to_string(),
        })?;

        if !self.handed_out.insert(addr) {
            return Err(NetError::PortReservation {
                host: self.host.to_string(),
                reason: format!("port {} handed out twice", addr.port()),
            });
        }

        Ok((listener, addr))
    }

    /// Reserve the five service ports of one node
    pub fn reserve_node(&mut self) -> NetResult<ReservedPorts> {
        let mut listeners = Vec::with_capacity(PORTS_PER_NODE);
        let mut addrs = [SocketAddr::new(self.host, 0); PORTS_PER_NODE];

        for slot in addrs.iter_mut() {
            let (listener, addr) = self.reserve_port()?;
            *slot = addr;
            listeners.push(listener);
        }

        let ports = PortSet::new(addrs);
        tracing::debug!(
            grpc = %ports.grpc(),
            rest = %ports.rest(),
            events = %ports.events(),
            cli = %ports.cli(),
            profile = %ports.profile(),
            "reserved node ports"
        );

        Ok(ReservedPorts { ports, listeners })
    }

    /// Reserve port sets for `count` nodes
    pub fn allocate(&mut self, count: usize) -> NetResult<Vec<ReservedPorts>> {
        (0..count).map(|_| self.reserve_node()).collect()
    }

    /// Reserve ports for a network of `peer_count` peers.
    ///
    /// With a membership service, one extra set is reserved first and split
    /// off before the peer sets.
    pub fn allocate_network(
        &mut self,
        peer_count: usize,
        with_member_service: bool,
    ) -> NetResult<NetworkPorts> {
        let extra = usize::from(with_member_service);
        let mut sets = self.allocate(peer_count + extra)?;

        let member_service = if with_member_service {
            Some(sets.remove(0))
        } else {
            None
        };

        Ok(NetworkPorts {
            member_service,
            peers: sets,
        })
    }
}
