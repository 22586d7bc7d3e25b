//! Network bootstrap orchestrator

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ledgernet_core::{NetError, NetResult, NodeSpec, NodeState, RunConfiguration};
use ledgernet_descriptor::{NetworkDescriptor, NetworkDescriptorWriter};
use ledgernet_launch::{
    CredentialStore, EnvironmentComposer, PeerContext, ProcessLauncher, ProcessRecord, Spawner,
    StaticCredentials,
};
use ledgernet_transport::{PortAllocator, Readiness, ReadinessWaiter};

use crate::NetworkProgress;

/// Result of a successful bootstrap
#[derive(Clone, Debug)]
pub struct NetworkReport {
    pub descriptor: NetworkDescriptor,
    pub descriptor_path: PathBuf,
    pub member_service: Option<ProcessRecord>,
    /// Peers in index order
    pub peers: Vec<ProcessRecord>,
}

/// Drives one bootstrap run
pub struct Orchestrator<S: Spawner> {
    config: RunConfiguration,
    launcher: ProcessLauncher<S>,
    credentials: Box<dyn CredentialStore>,
    waiter: ReadinessWaiter,
    progress: NetworkProgress,
}

impl<S: Spawner> Orchestrator<S> {
    pub fn new(config: RunConfiguration, spawner: S) -> Self {
        let launcher = ProcessLauncher::new(spawner, config.log_dir.clone(), config.debug);
        let waiter = ReadinessWaiter::new(config.poll_interval);
        Self {
            config,
            launcher,
            credentials: Box::new(StaticCredentials::empty()),
            waiter,
            progress: NetworkProgress::default(),
        }
    }

    /// Credential store consulted when security is enabled
    pub fn with_credentials(mut self, store: impl CredentialStore + 'static) -> Self {
        self.credentials = Box::new(store);
        self
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn progress(&self) -> &NetworkProgress {
        &self.progress
    }

    pub fn launcher(&self) -> &ProcessLauncher<S> {
        &self.launcher
    }

    /// Bring the whole network up.
    ///
    /// Any error aborts the run. Processes already started keep running and
    /// no descriptor is written.
    pub async fn run(&mut self) -> NetResult<NetworkReport> {
        self.config.validate()?;

        let config = &self.config;
        let peer_count = config.peer_count;
        let credentials = if config.security {
            self.credentials.resolve(peer_count)?
        } else {
            Vec::new()
        };

        let plan = NodeSpec::plan(peer_count, config.security);
        self.progress = NetworkProgress::new(&plan);

        let mut writer = NetworkDescriptorWriter::create(&config.descriptor_path, config)?;

        let network =
            PortAllocator::new(config.host).allocate_network(peer_count, config.security)?;
        for node in &plan {
            self.progress.advance(node.id(), NodeState::PortsReserved);
        }
        tracing::info!(
            peers = peer_count,
            security = config.security,
            consensus = %config.consensus,
            "reserved ports for {} nodes",
            plan.len()
        );

        let composer = EnvironmentComposer::new(config);

        // Peers need the membership service address, so it must be up first
        let mut member_service = None;
        let mut member_service_addr = None;
        if let Some(reserved) = network.member_service {
            let node = NodeSpec::member_service();
            let env = composer.compose_member_service(&node)?;
            // Listens on the fixed service port; the reserved primary port goes unused
            let addr = config.member_service_addr();

            let record = self.launcher.launch(
                &node,
                &config.member_service_executable,
                &[],
                env,
                reserved,
            )?;
            self.progress.advance(node.id(), NodeState::Launched);
            writer.record_member_service(addr, record.pid);

            self.progress.advance(node.id(), NodeState::AwaitingReady);
            match self.waiter.wait(addr, config.startup_timeout).await {
                Readiness::Ready { elapsed, .. } => {
                    self.progress.advance(node.id(), NodeState::Ready);
                    tracing::info!(node = %node, %addr, ?elapsed, "membership service ready");
                }
                Readiness::TimedOut { .. } => {
                    self.progress.advance(node.id(), NodeState::TimedOut);
                    return Err(NetError::ReadinessTimeout {
                        node: node.id().to_string(),
                        addr: addr.to_string(),
                        timeout: config.startup_timeout,
                    });
                }
            }

            member_service = Some(record);
            member_service_addr = Some(addr);
        }

        let mut discovery_root = None;
        let mut peers = Vec::with_capacity(peer_count);
        let mut targets = Vec::with_capacity(peer_count);

        for (index, reserved) in network.peers.into_iter().enumerate() {
            let node = NodeSpec::peer(index);
            let ports = *reserved.ports();
            let env = composer.compose_peer(
                &node,
                &ports,
                PeerContext {
                    discovery_root,
                    member_service: member_service_addr,
                    credential: credentials.get(index),
                },
            )?;

            let record = self.launcher.launch(
                &node,
                &config.peer_executable,
                &config.peer_args,
                env,
                reserved,
            )?;
            self.progress.advance(node.id(), NodeState::Launched);
            writer.record_peer(index, node.id(), &ports, record.pid)?;

            if node.is_discovery_root() {
                discovery_root = Some(ports.grpc());
            }
            targets.push((node, ports.rest()));
            peers.push(record);
        }

        wait_for_peers(
            self.waiter,
            config.startup_timeout,
            targets,
            &mut self.progress,
        )
        .await?;

        let descriptor = writer.finalize(peer_count)?;
        tracing::info!(
            peers = peer_count,
            path = %config.descriptor_path.display(),
            "network ready"
        );

        Ok(NetworkReport {
            descriptor,
            descriptor_path: config.descriptor_path.clone(),
            member_service,
            peers,
        })
    }
}

/// Wait for every peer's REST endpoint.
///
/// Peers only depend on their own launch, so the waits run concurrently.
/// Every wait runs to completion; the lowest-index failure is reported.
async fn wait_for_peers(
    waiter: ReadinessWaiter,
    timeout: Duration,
    targets: Vec<(NodeSpec, SocketAddr)>,
    progress: &mut NetworkProgress,
) -> NetResult<()> {
    let mut pending = Vec::with_capacity(targets.len());
    for (node, addr) in targets {
        progress.advance(node.id(), NodeState::AwaitingReady);
        let handle = tokio::spawn(async move { waiter.wait(addr, timeout).await });
        pending.push((node, addr, handle));
    }

    let mut first_failure = None;
    for (node, addr, handle) in pending {
        let readiness = match handle.await {
            Ok(readiness) => readiness,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Readiness::TimedOut { attempts: 0 },
        };

        match readiness {
            Readiness::Ready { elapsed, .. } => {
                progress.advance(node.id(), NodeState::Ready);
                tracing::info!(node = %node, %addr, ?elapsed, "peer ready");
            }
            Readiness::TimedOut { .. } => {
                progress.advance(node.id(), NodeState::TimedOut);
                first_failure.get_or_insert(NetError::ReadinessTimeout {
                    node: node.id().to_string(),
                    addr: addr.to_string(),
                    timeout,
                });
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
