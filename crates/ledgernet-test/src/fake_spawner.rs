//! In-process stand-in for node executables
//!
//! Instead of starting a process, [`FakeSpawner`] binds listeners on the
//! addresses the composed environment tells the node to serve, which is all
//! the readiness probes look at.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ledgernet_core::{NetError, NetResult, NodeRole};
use ledgernet_launch::{
    LaunchRequest, ProcessEnv, Spawner, ECA_ADDRESS, MEMBER_SERVICE_PORT_KEY, PEER_ADDRESS,
    REST_ADDRESS,
};

/// First pid handed out
pub const FAKE_PID_BASE: u32 = 1000;

/// One observed launch
#[derive(Clone, Debug)]
pub struct LaunchEvent {
    pub node_id: String,
    pub role: NodeRole,
    pub pid: u32,
    pub env: ProcessEnv,

    /// For secured peers: whether the membership service address in the
    /// environment accepted a connection at launch time
    pub member_service_reachable: Option<bool>,
}

#[derive(Default)]
struct FakeState {
    launches: Vec<LaunchEvent>,
    listeners: Vec<TcpListener>,
    failing: HashSet<String>,
    silent: HashSet<String>,
}

/// Fake spawner; clones share recorded state
#[derive(Clone)]
pub struct FakeSpawner {
    host: IpAddr,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl FakeSpawner {
    /// Fake nodes serving on `host`
    pub fn new(host: IpAddr) -> Self {
        Self {
            host,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Spawning `node_id` fails
    pub fn failing(self, node_id: &str) -> Self {
        self.state.lock().failing.insert(node_id.to_string());
        self
    }

    /// `node_id` "starts" but never listens
    pub fn silent(self, node_id: &str) -> Self {
        self.state.lock().silent.insert(node_id.to_string());
        self
    }

    /// Launches observed so far, in order
    pub fn launches(&self) -> Vec<LaunchEvent> {
        self.state.lock().launches.clone()
    }

    /// Close every fake node's listeners
    pub fn shutdown(&self) {
        self.state.lock().listeners.clear();
    }

    fn serve_addrs(&self, request: &LaunchRequest) -> NetResult<Vec<SocketAddr>> {
        let bad_env = |key: &str| NetError::Launch {
            node: request.node.id().to_string(),
            reason: format!("missing or malformed {}", key),
        };

        match request.node.role() {
            NodeRole::MemberService => {
                let port = request
                    .env
                    .get(MEMBER_SERVICE_PORT_KEY)
                    .and_then(|p| p.parse::<u16>().ok())
                    .ok_or_else(|| bad_env(MEMBER_SERVICE_PORT_KEY))?;
                Ok(vec![SocketAddr::new(self.host, port)])
            }
            NodeRole::Peer => [PEER_ADDRESS, REST_ADDRESS]
                .into_iter()
                .map(|key| {
                    request
                        .env
                        .get(key)
                        .and_then(|a| a.parse::<SocketAddr>().ok())
                        .ok_or_else(|| bad_env(key))
                })
                .collect(),
        }
    }
}

fn probe(addr: &str) -> bool {
    addr.parse::<SocketAddr>()
        .map(|addr| TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok())
        .unwrap_or(false)
}

impl Spawner for FakeSpawner {
    fn spawn(&mut self, request: &LaunchRequest) -> NetResult<u32> {
        let node_id = request.node.id().to_string();
        let addrs = self.serve_addrs(request)?;
        let member_service_reachable = request.env.get(ECA_ADDRESS).map(probe);

        let mut state = self.state.lock();
        if state.failing.contains(&node_id) {
            return Err(NetError::Launch {
                node: node_id,
                reason: "injected spawn failure".to_string(),
            });
        }

        if !state.silent.contains(&node_id) {
            for addr in addrs {
                let listener = TcpListener::bind(addr).map_err(|e| NetError::Launch {
                    node: node_id.clone(),
                    reason: format!("cannot serve {}: {}", addr, e),
                })?;
                state.listeners.push(listener);
            }
        }

        let pid = FAKE_PID_BASE + state.launches.len() as u32;
        state.launches.push(LaunchEvent {
            node_id,
            role: request.node.role(),
            pid,
            env: request.env.clone(),
            member_service_reachable,
        });
        Ok(pid)
    }
}
