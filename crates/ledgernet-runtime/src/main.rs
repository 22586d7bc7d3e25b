//! ledgernet - start a local multi-process ledger network
//!
//! Reserves ports, launches the membership service (with `--security`) and
//! the peers, waits until every node accepts connections and writes a JSON
//! descriptor of the network. Exits non-zero if any stage fails.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ledgernet_core::{ChaincodeMode, ConsensusMode, NetResult, RunConfiguration};
use ledgernet_launch::{CommandSpawner, CredentialFile};
use ledgernet_runtime::{NetworkReport, Orchestrator};

#[derive(Debug, Parser)]
#[command(name = "ledgernet", version, about = "Start a local ledger test network")]
struct Cli {
    /// Number of peers to start
    #[arg(short = 'n', long, default_value_t = 4, env = "LEDGERNET_PEERS")]
    peers: usize,

    /// Start the membership service and enroll peers with it
    #[arg(long)]
    security: bool,

    /// Consensus mode: noops, batch, classic or sieve
    #[arg(long, default_value = "noops", env = "LEDGERNET_CONSENSUS")]
    consensus: ConsensusMode,

    /// Chaincode mode: net or dev
    #[arg(long, default_value = "net")]
    chaincode_mode: ChaincodeMode,

    /// How long each node may take to accept connections
    #[arg(
        long,
        default_value = "30s",
        value_parser = humantime::parse_duration,
        env = "LEDGERNET_TIMEOUT"
    )]
    timeout: Duration,

    /// Delay between readiness probes
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    poll_interval: Duration,

    /// Leave node output on this terminal instead of log files
    #[arg(long)]
    debug: bool,

    /// Directory for per-node stdout/stderr logs
    #[arg(long, default_value = "ledgernet/logs")]
    log_dir: PathBuf,

    /// Where to write the network descriptor
    #[arg(long, default_value = "ledgernet/network.json", env = "LEDGERNET_DESCRIPTOR")]
    descriptor: PathBuf,

    /// Interface every service binds to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Peer executable
    #[arg(long, default_value = "peer", env = "LEDGERNET_PEER_BIN")]
    peer_bin: PathBuf,

    /// Membership service executable
    #[arg(long, default_value = "membersrvc", env = "LEDGERNET_MEMBERSRVC_BIN")]
    membersrvc_bin: PathBuf,

    /// JSON file of enrollment credentials, one per peer
    #[arg(long, env = "LEDGERNET_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Logging level handed to every node
    #[arg(long, default_value = "info")]
    logging_level: String,

    /// Container runtime endpoint handed to peers
    #[arg(long, default_value = "unix:///var/run/docker.sock")]
    vm_endpoint: String,

    /// Enable the peers' profiling server
    #[arg(long)]
    profile: bool,

    /// Root directory for peer ledger storage
    #[arg(long, default_value = "ledgernet/storage")]
    storage_root: PathBuf,

    /// Emit this tool's own logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration {
            peer_count: self.peers,
            security: self.security,
            consensus: self.consensus,
            chaincode_mode: self.chaincode_mode,
            startup_timeout: self.timeout,
            poll_interval: self.poll_interval,
            debug: self.debug,
            log_dir: self.log_dir.clone(),
            descriptor_path: self.descriptor.clone(),
            host: self.host,
            peer_executable: self.peer_bin.clone(),
            member_service_executable: self.membersrvc_bin.clone(),
            logging_level: self.logging_level.clone(),
            vm_endpoint: self.vm_endpoint.clone(),
            profiling: self.profile,
            storage_root: self.storage_root.clone(),
            ..RunConfiguration::default()
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn bootstrap(cli: &Cli) -> NetResult<NetworkReport> {
    let config = cli.run_configuration();
    let orchestrator = Orchestrator::new(config, CommandSpawner);
    let mut orchestrator = match &cli.credentials {
        Some(path) => orchestrator.with_credentials(CredentialFile::load(path)?),
        None => orchestrator,
    };
    orchestrator.run().await
}

/// Process exit status for a bootstrap outcome
fn exit_status(outcome: &NetResult<NetworkReport>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let outcome = bootstrap(&cli).await;
    match &outcome {
        Ok(report) => {
            if let Some(ms) = &report.member_service {
                println!("{:<12} pid {}", ms.node_id, ms.pid);
            }
            for peer in &report.peers {
                println!("{:<12} pid {}", peer.node_id, peer.pid);
            }
            println!("descriptor   {}", report.descriptor_path.display());
        }
        Err(err) => {
            tracing::error!(
                kind = ?err.kind(),
                node = err.node().unwrap_or("-"),
                "bootstrap failed"
            );
            eprintln!("ledgernet: {}", err);
        }
    }
    ExitCode::from(exit_status(&outcome))
}
