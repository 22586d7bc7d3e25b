//! Isolated run configurations for tests

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use ledgernet_core::RunConfiguration;
use ledgernet_launch::{Credential, StaticCredentials};

/// Scratch directory unique to this process and `tag`, emptied on creation
pub fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ledgernet-test-{}-{}", tag, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Next candidate for [`service_port`], below the usual ephemeral range
static NEXT_SERVICE_PORT: AtomicU16 = AtomicU16::new(0);

/// A fixed-style service port nothing listens on right now.
///
/// Picked below 32768 so ephemeral reservations made by the same run cannot
/// land on it.
pub fn service_port() -> u16 {
    let _ = NEXT_SERVICE_PORT.compare_exchange(
        0,
        20000 + (std::process::id() % 8000) as u16,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
    loop {
        let port = NEXT_SERVICE_PORT.fetch_add(1, Ordering::SeqCst);
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return port;
        }
    }
}

/// Configuration with short timeouts and all files under a scratch dir.
///
/// The membership service gets its own port instead of the well-known one so
/// parallel tests do not collide.
pub fn test_config(tag: &str, peers: usize) -> RunConfiguration {
    let dir = scratch_dir(tag);
    RunConfiguration::default()
        .with_peers(peers)
        .with_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(20))
        .with_log_dir(dir.join("logs"))
        .with_storage_root(dir.join("storage"))
        .with_descriptor_path(dir.join("network.json"))
        .with_member_service_port(service_port())
}

/// `count` credentials named `test_vp<i>`
pub fn test_credentials(count: usize) -> StaticCredentials {
    StaticCredentials::new(
        (0..count)
            .map(|i| Credential::new(format!("test_vp{}", i), format!("secret-{}", i)))
            .collect(),
    )
}
