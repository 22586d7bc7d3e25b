//! End-to-end bootstrap scenarios against fake nodes

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use ledgernet_core::{ErrorKind, NodeRole, NodeState, RunConfiguration};
use ledgernet_descriptor::NetworkDescriptor;
use ledgernet_launch::{
    DISCOVERY_ROOT, ENROLL_ID, ENROLL_SECRET, MEMBER_SERVICE_ADDRESS_KEYS, PEER_ADDRESS,
    SECURITY_ENABLED,
};
use ledgernet_runtime::{NetworkReport, Orchestrator};

use crate::{test_config, test_credentials, FakeSpawner};

async fn bootstrap(
    config: RunConfiguration,
    spawner: FakeSpawner,
    credentials: usize,
) -> (Orchestrator<FakeSpawner>, ledgernet_core::NetResult<NetworkReport>) {
    let mut orchestrator =
        Orchestrator::new(config, spawner).with_credentials(test_credentials(credentials));
    let result = orchestrator.run().await;
    (orchestrator, result)
}

fn read_descriptor(config: &RunConfiguration) -> NetworkDescriptor {
    let raw = std::fs::read_to_string(&config.descriptor_path).unwrap();
    NetworkDescriptor::from_json(&raw).unwrap()
}

fn cleanup(config: &RunConfiguration) {
    if let Some(dir) = config.descriptor_path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

// ============================================================================
// DESCRIPTOR SHAPE
// ============================================================================

#[tokio::test]
async fn test_single_peer_network() {
    let config = test_config("single", 1);
    let spawner = FakeSpawner::default();
    let (orchestrator, result) = bootstrap(config.clone(), spawner.clone(), 0).await;
    let report = result.unwrap();

    let descriptor = read_descriptor(&config);
    assert_eq!(descriptor, report.descriptor);
    assert_eq!(descriptor.peers.len(), 1);
    assert_eq!(descriptor.peers[0].id, "vp0");
    assert!(descriptor.membersrvc.is_none());
    assert_eq!(descriptor.security, "false");

    let launches = spawner.launches();
    assert_eq!(launches.len(), 1);
    assert!(!launches[0].env.contains(DISCOVERY_ROOT));
    assert!(orchestrator.progress().all_ready());

    spawner.shutdown();
    cleanup(&config);
}

#[tokio::test]
async fn test_peer_records_are_ordered_and_disjoint() {
    for peers in 1..=5 {
        let config = test_config(&format!("shape{}", peers), peers);
        let spawner = FakeSpawner::default();
        let (_, result) = bootstrap(config.clone(), spawner.clone(), 0).await;
        result.unwrap();

        let descriptor = read_descriptor(&config);
        assert_eq!(descriptor.peers.len(), peers);

        let mut seen = HashSet::new();
        for (index, peer) in descriptor.peers.iter().enumerate() {
            assert_eq!(peer.id, format!("vp{}", index));
            let addrs = peer.addresses();
            let distinct: HashSet<_> = addrs.iter().collect();
            assert_eq!(distinct.len(), 5, "{} reuses a port", peer.id);
            for addr in addrs {
                let parsed: SocketAddr = addr.parse().unwrap();
                assert_ne!(parsed.port(), 0);
                assert!(seen.insert(parsed.port()), "port {} shared", parsed.port());
            }
        }

        spawner.shutdown();
        cleanup(&config);
    }
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

#[tokio::test]
async fn test_discovery_root_is_peer_zero() {
    let config = test_config("discovery", 4);
    let spawner = FakeSpawner::default();
    let (_, result) = bootstrap(config.clone(), spawner.clone(), 0).await;
    let report = result.unwrap();

    let root = &report.descriptor.peers[0].grpc;
    let launches = spawner.launches();
    assert_eq!(launches[0].env.get(PEER_ADDRESS), Some(root.as_str()));
    assert!(!launches[0].env.contains(DISCOVERY_ROOT));
    for launch in &launches[1..] {
        assert_eq!(launch.env.get(DISCOVERY_ROOT), Some(root.as_str()));
    }

    for launch in &launches {
        assert_eq!(launch.env.get(SECURITY_ENABLED), Some("false"));
        assert!(!launch.env.contains(ENROLL_ID));
        assert!(!launch.env.contains(ENROLL_SECRET));
    }

    spawner.shutdown();
    cleanup(&config);
}

#[tokio::test]
async fn test_secured_network_launches_member_service_first() {
    let config = test_config("secure", 4).with_security(true);
    let spawner = FakeSpawner::default();
    let (orchestrator, result) = bootstrap(config.clone(), spawner.clone(), 4).await;
    let report = result.unwrap();

    let launches = spawner.launches();
    assert_eq!(launches.len(), 5);
    assert_eq!(launches[0].role, NodeRole::MemberService);
    assert_eq!(
        launches
            .iter()
            .filter(|l| l.role == NodeRole::MemberService)
            .count(),
        1
    );

    let ca = config.member_service_addr().to_string();
    let mut identities = HashSet::new();
    for (index, launch) in launches[1..].iter().enumerate() {
        assert_eq!(launch.node_id, format!("vp{}", index));
        // Membership service was already accepting connections
        assert_eq!(launch.member_service_reachable, Some(true));
        for key in MEMBER_SERVICE_ADDRESS_KEYS {
            assert_eq!(launch.env.get(key), Some(ca.as_str()));
        }
        assert_eq!(launch.env.get(SECURITY_ENABLED), Some("true"));
        let id = launch.env.get(ENROLL_ID).unwrap();
        assert_eq!(id, format!("test_vp{}", index));
        assert!(identities.insert(id.to_string()));
    }

    let descriptor = read_descriptor(&config);
    let ms = descriptor.membersrvc.as_ref().unwrap();
    assert_eq!(ms.service, ca);
    assert_eq!(ms.pid, report.member_service.unwrap().pid.to_string());
    assert_eq!(descriptor.security, "true");

    let ca_port = config.member_service_port;
    for peer in &descriptor.peers {
        for addr in peer.addresses() {
            assert_ne!(addr.parse::<SocketAddr>().unwrap().port(), ca_port);
        }
    }
    assert_eq!(
        orchestrator.progress().state("membersrvc"),
        Some(NodeState::Ready)
    );

    spawner.shutdown();
    cleanup(&config);
}

#[tokio::test]
async fn test_credential_shortfall_launches_nothing() {
    let config = test_config("short", 4).with_security(true);
    let spawner = FakeSpawner::default();
    let (_, result) = bootstrap(config.clone(), spawner.clone(), 2).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(spawner.launches().is_empty());
    assert!(!config.descriptor_path.exists());
    cleanup(&config);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_silent_peer_times_out_without_descriptor() {
    let config = test_config("silent", 4).with_timeout(Duration::from_millis(300));
    let spawner = FakeSpawner::default().silent("vp2");
    let (orchestrator, result) = bootstrap(config.clone(), spawner.clone(), 0).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadinessTimeout);
    assert_eq!(err.node(), Some("vp2"));
    // Every peer was launched before the waits started
    assert_eq!(spawner.launches().len(), 4);
    assert!(!config.descriptor_path.exists());
    assert_eq!(orchestrator.progress().state("vp2"), Some(NodeState::TimedOut));
    assert_eq!(orchestrator.progress().state("vp1"), Some(NodeState::Ready));

    spawner.shutdown();
    cleanup(&config);
}

#[tokio::test]
async fn test_silent_member_service_blocks_peers() {
    let config = test_config("silent-ca", 2)
        .with_security(true)
        .with_timeout(Duration::from_millis(300));
    let spawner = FakeSpawner::default().silent("membersrvc");
    let (_, result) = bootstrap(config.clone(), spawner.clone(), 2).await;

    let err = result.unwrap_err();
    assert_eq!(err.node(), Some("membersrvc"));
    let launches = spawner.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].role, NodeRole::MemberService);
    assert!(!config.descriptor_path.exists());
    cleanup(&config);
}

#[tokio::test]
async fn test_launch_failure_aborts_run() {
    let config = test_config("fail", 3);
    let spawner = FakeSpawner::default().failing("vp1");
    let (orchestrator, result) = bootstrap(config.clone(), spawner.clone(), 0).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Launch);
    assert_eq!(err.node(), Some("vp1"));
    // vp0 stays up, vp2 is never attempted
    let launched: Vec<_> = spawner.launches().into_iter().map(|l| l.node_id).collect();
    assert_eq!(launched, vec!["vp0"]);
    assert_eq!(orchestrator.progress().state("vp2"), Some(NodeState::PortsReserved));
    assert!(!config.descriptor_path.exists());

    spawner.shutdown();
    cleanup(&config);
}

#[tokio::test]
async fn test_aborted_run_removes_stale_descriptor() {
    let config = test_config("stale", 2).with_timeout(Duration::from_millis(200));
    std::fs::create_dir_all(config.descriptor_path.parent().unwrap()).unwrap();
    std::fs::write(&config.descriptor_path, "{\"peers\": []}").unwrap();

    let spawner = FakeSpawner::default().silent("vp0");
    let (_, result) = bootstrap(config.clone(), spawner.clone(), 0).await;

    assert!(result.is_err());
    assert!(!config.descriptor_path.exists());

    spawner.shutdown();
    cleanup(&config);
}
