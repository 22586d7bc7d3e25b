//! Per-process environment composition
//!
//! Each launched process gets its own immutable [`ProcessEnv`], built from
//! the run configuration, the node's reserved ports and what is already
//! known about the network (discovery root, membership service address).

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use ledgernet_core::{NetError, NetResult, NodeRole, NodeSpec, PortSet, RunConfiguration};

use crate::Credential;

// Global keys
pub const LOGGING_LEVEL: &str = "CORE_LOGGING_LEVEL";
pub const CONSENSUS_PLUGIN: &str = "CORE_PEER_VALIDATOR_CONSENSUS_PLUGIN";
pub const PBFT_MODE: &str = "CORE_PBFT_GENERAL_MODE";
pub const PBFT_N: &str = "CORE_PBFT_GENERAL_N";
pub const VM_ENDPOINT: &str = "CORE_VM_ENDPOINT";
pub const PROFILE_ENABLED: &str = "CORE_PEER_PROFILE_ENABLED";

// Per-peer keys
pub const PEER_ID: &str = "CORE_PEER_ID";
pub const PEER_ADDRESS: &str = "CORE_PEER_ADDRESS";
pub const PEER_LISTEN_ADDRESS: &str = "CORE_PEER_LISTENADDRESS";
pub const REST_ADDRESS: &str = "CORE_REST_ADDRESS";
pub const EVENTS_ADDRESS: &str = "CORE_PEER_VALIDATOR_EVENTS_ADDRESS";
pub const CLI_ADDRESS: &str = "CORE_CLI_ADDRESS";
pub const PROFILE_LISTEN_ADDRESS: &str = "CORE_PEER_PROFILE_LISTENADDRESS";
pub const FILESYSTEM_PATH: &str = "CORE_PEER_FILESYSTEMPATH";
pub const DISCOVERY_ROOT: &str = "CORE_PEER_DISCOVERY_ROOTNODE";

// Security keys
pub const SECURITY_ENABLED: &str = "CORE_SECURITY_ENABLED";
pub const ENROLL_ID: &str = "CORE_SECURITY_ENROLLID";
pub const ENROLL_SECRET: &str = "CORE_SECURITY_ENROLLSECRET";
pub const ECA_ADDRESS: &str = "CORE_PEER_PKI_ECA_PADDR";
pub const TCA_ADDRESS: &str = "CORE_PEER_PKI_TCA_PADDR";
pub const TLSCA_ADDRESS: &str = "CORE_PEER_PKI_TLSCA_PADDR";

// Membership service keys
pub const MEMBER_SERVICE_PORT_KEY: &str = "MEMBERSRVC_CA_SERVER_PORT";
pub const MEMBER_SERVICE_LOGGING_LEVEL: &str = "MEMBERSRVC_CA_LOGGING_LEVEL";

/// The three membership service address keys every secured peer receives
pub const MEMBER_SERVICE_ADDRESS_KEYS: [&str; 3] = [ECA_ADDRESS, TCA_ADDRESS, TLSCA_ADDRESS];

/// Complete environment for one process
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: BTreeMap<String, String>,
}

impl ProcessEnv {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Network facts a peer's environment depends on
#[derive(Clone, Copy, Debug, Default)]
pub struct PeerContext<'a> {
    /// RPC address of peer 0, required for every peer with index > 0
    pub discovery_root: Option<SocketAddr>,

    /// Membership service address, known only once it passed readiness
    pub member_service: Option<SocketAddr>,

    /// Enrollment credential for this peer
    pub credential: Option<&'a Credential>,
}

/// Builds process environments for one run
pub struct EnvironmentComposer<'a> {
    config: &'a RunConfiguration,
}

impl<'a> EnvironmentComposer<'a> {
    pub fn new(config: &'a RunConfiguration) -> Self {
        Self { config }
    }

    /// Environment of the membership service.
    ///
    /// Only its service port binding and logging level; the port comes from
    /// the configuration, not from the node's reserved set.
    pub fn compose_member_service(&self, node: &NodeSpec) -> NetResult<ProcessEnv> {
        if node.role() != NodeRole::MemberService {
            return Err(NetError::Validation(format!(
                "{} is not the membership service",
                node
            )));
        }

        let mut env = ProcessEnv::default();
        env.set(
            MEMBER_SERVICE_PORT_KEY,
            self.config.member_service_port.to_string(),
        );
        env.set(MEMBER_SERVICE_LOGGING_LEVEL, self.config.logging_level.as_str());
        Ok(env)
    }

    /// Environment of a peer
    pub fn compose_peer(
        &self,
        node: &NodeSpec,
        ports: &PortSet,
        ctx: PeerContext<'_>,
    ) -> NetResult<ProcessEnv> {
        let index = match (node.role(), node.index()) {
            (NodeRole::Peer, Some(index)) => index,
            _ => {
                return Err(NetError::Validation(format!("{} is not a peer", node)));
            }
        };

        let mut env = ProcessEnv::default();
        self.apply_global(&mut env);

        env.set(PEER_ID, node.id());
        env.set(PEER_ADDRESS, ports.grpc().to_string());
        env.set(PEER_LISTEN_ADDRESS, listen_any(ports.grpc()).to_string());
        env.set(REST_ADDRESS, ports.rest().to_string());
        env.set(EVENTS_ADDRESS, ports.events().to_string());
        env.set(CLI_ADDRESS, ports.cli().to_string());
        env.set(PROFILE_LISTEN_ADDRESS, ports.profile().to_string());
        env.set(
            FILESYSTEM_PATH,
            self.config
                .storage_root
                .join(node.id())
                .to_string_lossy()
                .into_owned(),
        );

        // Peer 0 is the discovery root and gets no override
        if index > 0 {
            let root = ctx.discovery_root.ok_or_else(|| {
                NetError::Validation(format!("{} composed before the discovery root", node))
            })?;
            env.set(DISCOVERY_ROOT, root.to_string());
        }

        if self.config.security {
            let credential = ctx.credential.ok_or_else(|| NetError::InsufficientCredentials {
                required: self.config.peer_count,
                available: index,
            })?;
            let member_service = ctx.member_service.ok_or_else(|| {
                NetError::Validation(format!(
                    "{} composed before the membership service was ready",
                    node
                ))
            })?;

            env.set(SECURITY_ENABLED, "true");
            env.set(ENROLL_ID, credential.id.as_str());
            env.set(ENROLL_SECRET, credential.secret.as_str());
            for key in MEMBER_SERVICE_ADDRESS_KEYS {
                env.set(key, member_service.to_string());
            }
        } else {
            env.set(SECURITY_ENABLED, "false");
        }

        Ok(env)
    }

    fn apply_global(&self, env: &mut ProcessEnv) {
        let consensus = self.config.consensus;
        env.set(LOGGING_LEVEL, self.config.logging_level.as_str());
        env.set(CONSENSUS_PLUGIN, consensus.plugin());
        if let Some(mode) = consensus.pbft_mode() {
            env.set(PBFT_MODE, mode);
            env.set(PBFT_N, self.config.peer_count.to_string());
        }
        env.set(VM_ENDPOINT, self.config.vm_endpoint.as_str());
        env.set(PROFILE_ENABLED, self.config.profiling.to_string());
    }
}

/// Wildcard address of `addr`'s family on the same port
fn listen_any(addr: SocketAddr) -> SocketAddr {
    let any = match addr.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(any, addr.port())
}
