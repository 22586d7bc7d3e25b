//! Run configuration
//!
//! [`RunConfiguration`] is assembled once by the front end and handed to the
//! orchestrator, which never mutates it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{NetError, NetResult, MEMBER_SERVICE_PORT};

/// Readiness polls must be at least this frequent
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// CONSENSUS MODE
// ============================================================================

/// Consensus algorithm run by the peers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsensusMode {
    Noops,
    Batch,
    Classic,
    Sieve,
}

/// `(mode, name, plugin, pbft mode)`
static CONSENSUS_TABLE: [(ConsensusMode, &str, &str, Option<&str>); 4] = [
    (ConsensusMode::Noops, "noops", "noops", None),
    (ConsensusMode::Batch, "batch", "pbft", Some("batch")),
    (ConsensusMode::Classic, "classic", "pbft", Some("classic")),
    (ConsensusMode::Sieve, "sieve", "pbft", Some("sieve")),
];

impl ConsensusMode {
    pub const ALL: [ConsensusMode; 4] = [
        ConsensusMode::Noops,
        ConsensusMode::Batch,
        ConsensusMode::Classic,
        ConsensusMode::Sieve,
    ];

    fn entry(self) -> &'static (ConsensusMode, &'static str, &'static str, Option<&'static str>) {
        &CONSENSUS_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    /// Consensus plugin the peer binary loads
    pub fn plugin(self) -> &'static str {
        self.entry().2
    }

    /// PBFT sub-mode, `None` for plugins other than pbft
    pub fn pbft_mode(self) -> Option<&'static str> {
        self.entry().3
    }
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConsensusMode {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CONSENSUS_TABLE
            .iter()
            .find(|(_, name, _, _)| *name == wanted)
            .map(|(mode, _, _, _)| *mode)
            .ok_or_else(|| {
                NetError::Validation(format!(
                    "unknown consensus mode '{}' (expected noops, batch, classic or sieve)",
                    s
                ))
            })
    }
}

// ============================================================================
// CHAINCODE MODE
// ============================================================================

/// How peers deploy chaincode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChaincodeMode {
    /// Chaincode runs in containers managed by the peer
    Net,
    /// Chaincode is started by the developer
    Dev,
}

impl ChaincodeMode {
    pub fn name(self) -> &'static str {
        match self {
            ChaincodeMode::Net => "net",
            ChaincodeMode::Dev => "dev",
        }
    }
}

impl fmt::Display for ChaincodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChaincodeMode {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "net" => Ok(ChaincodeMode::Net),
            "dev" => Ok(ChaincodeMode::Dev),
            other => Err(NetError::Validation(format!(
                "unknown chaincode mode '{}' (expected net or dev)",
                other
            ))),
        }
    }
}

// ============================================================================
// RUN CONFIGURATION
// ============================================================================

/// Everything the orchestrator needs to bring up a network
#[derive(Clone, Debug)]
pub struct RunConfiguration {
    /// Number of peers (at least one)
    pub peer_count: usize,

    /// Launch the membership service and enroll peers with it
    pub security: bool,

    pub consensus: ConsensusMode,

    pub chaincode_mode: ChaincodeMode,

    /// Deadline for each readiness wait
    pub startup_timeout: Duration,

    /// Delay between connection attempts while waiting for readiness
    pub poll_interval: Duration,

    /// Leave child output attached to the terminal instead of log files
    pub debug: bool,

    /// Directory for per-node stdout/stderr logs
    pub log_dir: PathBuf,

    /// Where the network descriptor is written
    pub descriptor_path: PathBuf,

    /// Interface all services bind to
    pub host: IpAddr,

    pub peer_executable: PathBuf,

    pub peer_args: Vec<String>,

    pub member_service_executable: PathBuf,

    /// Port the membership service listens on
    pub member_service_port: u16,

    /// Logging level handed to every node
    pub logging_level: String,

    /// Container runtime endpoint handed to peers
    pub vm_endpoint: String,

    /// Enable the peers' profiling server
    pub profiling: bool,

    /// Root for per-peer ledger storage
    pub storage_root: PathBuf,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            peer_count: 4,
            security: false,
            consensus: ConsensusMode::Noops,
            chaincode_mode: ChaincodeMode::Net,
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            debug: false,
            log_dir: PathBuf::from("ledgernet/logs"),
            descriptor_path: PathBuf::from("ledgernet/network.json"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            peer_executable: PathBuf::from("peer"),
            peer_args: vec!["node".to_string(), "start".to_string()],
            member_service_executable: PathBuf::from("membersrvc"),
            member_service_port: MEMBER_SERVICE_PORT,
            logging_level: "info".to_string(),
            vm_endpoint: "unix:///var/run/docker.sock".to_string(),
            profiling: false,
            storage_root: PathBuf::from("ledgernet/storage"),
        }
    }
}

impl RunConfiguration {
    /// Set peer count
    pub fn with_peers(mut self, count: usize) -> Self {
        self.peer_count = count;
        self
    }

    /// Enable or disable the membership service
    pub fn with_security(mut self, security: bool) -> Self {
        self.security = security;
        self
    }

    pub fn with_consensus(mut self, consensus: ConsensusMode) -> Self {
        self.consensus = consensus;
        self
    }

    /// Set readiness deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_descriptor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.descriptor_path = path.into();
        self
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }

    pub fn with_member_service_port(mut self, port: u16) -> Self {
        self.member_service_port = port;
        self
    }

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    /// Address peers use to reach the membership service
    pub fn member_service_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.member_service_port)
    }

    /// Reject configurations the bootstrap cannot run
    pub fn validate(&self) -> NetResult<()> {
        if self.peer_count < 1 {
            return Err(NetError::Validation(
                "peer count must be at least 1".to_string(),
            ));
        }
        if self.startup_timeout.is_zero() {
            return Err(NetError::Validation(
                "startup timeout must be non-zero".to_string(),
            ));
        }
        if self.poll_interval >= MAX_POLL_INTERVAL {
            return Err(NetError::Validation(format!(
                "poll interval {:?} must be below {:?}",
                self.poll_interval, MAX_POLL_INTERVAL
            )));
        }
        if self.poll_interval.is_zero() || self.poll_interval >= self.startup_timeout {
            return Err(NetError::Validation(format!(
                "poll interval {:?} must be non-zero and shorter than the startup timeout {:?}",
                self.poll_interval, self.startup_timeout
            )));
        }
        if self.security && self.member_service_port == 0 {
            return Err(NetError::Validation(
                "membership service port must be non-zero".to_string(),
            ));
        }
        if self.logging_level.trim().is_empty() {
            return Err(NetError::Validation(
                "logging level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_table() {
        assert_eq!(ConsensusMode::Noops.plugin(), "noops");
        assert_eq!(ConsensusMode::Noops.pbft_mode(), None);
        for mode in [ConsensusMode::Batch, ConsensusMode::Classic, ConsensusMode::Sieve] {
            assert_eq!(mode.plugin(), "pbft");
            assert_eq!(mode.pbft_mode(), Some(mode.name()));
        }
    }

    #[test]
    fn test_consensus_parse() {
        for mode in ConsensusMode::ALL {
            assert_eq!(mode.name().parse::<ConsensusMode>().unwrap(), mode);
        }
        assert_eq!("BATCH".parse::<ConsensusMode>().unwrap(), ConsensusMode::Batch);
        assert!("raft".parse::<ConsensusMode>().is_err());
    }

    #[test]
    fn test_chaincode_parse() {
        assert_eq!("dev".parse::<ChaincodeMode>().unwrap(), ChaincodeMode::Dev);
        assert!("docker".parse::<ChaincodeMode>().is_err());
    }

    #[test]
    fn test_default_validates() {
        assert!(RunConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_zero_peers_rejected() {
        let err = RunConfiguration::default().with_peers(0).validate().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_poll_interval_must_be_shorter_than_timeout() {
        let config = RunConfiguration::default()
            .with_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(100));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_must_be_sub_second() {
        let config = RunConfiguration::default().with_poll_interval(Duration::from_secs(10));
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);

        let config = RunConfiguration::default().with_poll_interval(MAX_POLL_INTERVAL);
        assert!(config.validate().is_err());

        let config = RunConfiguration::default()
            .with_poll_interval(Duration::from_millis(999));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_member_service_addr() {
        let config = RunConfiguration::default();
        assert_eq!(config.member_service_addr().port(), MEMBER_SERVICE_PORT);
        assert_eq!(config.member_service_addr().ip(), config.host);
    }
}
