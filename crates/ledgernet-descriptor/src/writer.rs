//! Descriptor builder and atomic writer

use std::collections::BTreeMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use ledgernet_core::{NetError, NetResult, PortSet, RunConfiguration};

use crate::{MemberServiceRecord, NetworkDescriptor, PeerRecord, CREATED_BY, NETWORK_MODE_LOCAL};

/// Accumulates node records and persists the descriptor once complete
#[derive(Debug)]
pub struct NetworkDescriptorWriter {
    path: PathBuf,
    header: NetworkDescriptor,
    member_service: Option<MemberServiceRecord>,
    peers: BTreeMap<usize, PeerRecord>,
}

fn descriptor_err(path: &Path, action: &str, e: impl std::fmt::Display) -> NetError {
    NetError::Descriptor(format!("cannot {} {}: {}", action, path.display(), e))
}

impl NetworkDescriptorWriter {
    /// Start a descriptor for this run.
    ///
    /// A descriptor left at `path` by an earlier run is removed, so readers
    /// never mistake it for the network being started.
    pub fn create(path: impl Into<PathBuf>, config: &RunConfiguration) -> NetResult<Self> {
        let path = path.into();
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale descriptor"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(descriptor_err(&path, "remove stale", e)),
        }

        let header = NetworkDescriptor {
            network_mode: NETWORK_MODE_LOCAL.to_string(),
            chaincode_mode: config.chaincode_mode.to_string(),
            host: config.host.to_string(),
            date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            created_by: CREATED_BY.to_string(),
            security: config.security.to_string(),
            consensus: config.consensus.to_string(),
            peer_profile_server: config.profiling.to_string(),
            membersrvc: None,
            peers: Vec::new(),
        };

        Ok(Self {
            path,
            header,
            member_service: None,
            peers: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn record_member_service(&mut self, service: SocketAddr, pid: u32) {
        self.member_service = Some(MemberServiceRecord {
            service: service.to_string(),
            pid: pid.to_string(),
        });
    }

    /// Record a launched peer; each index may be recorded once
    pub fn record_peer(
        &mut self,
        index: usize,
        id: &str,
        ports: &PortSet,
        pid: u32,
    ) -> NetResult<()> {
        if self.peers.contains_key(&index) {
            return Err(NetError::Descriptor(format!("peer {} recorded twice", index)));
        }
        self.peers.insert(index, PeerRecord::new(id, ports, pid));
        Ok(())
    }

    /// Current document, peers in ascending index order
    pub fn snapshot(&self) -> NetworkDescriptor {
        NetworkDescriptor {
            membersrvc: self.member_service.clone(),
            peers: self.peers.values().cloned().collect(),
            ..self.header.clone()
        }
    }

    /// Write the document once all `expected_peers` are recorded.
    ///
    /// The content goes to a sibling temporary file that is then renamed over
    /// the target, so readers see either no file or the complete document.
    pub fn finalize(self, expected_peers: usize) -> NetResult<NetworkDescriptor> {
        let contiguous = self.peers.keys().copied().eq(0..expected_peers);
        if !contiguous {
            return Err(NetError::Descriptor(format!(
                "expected peers 0..{} but recorded {:?}",
                expected_peers,
                self.peers.keys().collect::<Vec<_>>()
            )));
        }

        let descriptor = self.snapshot();
        let json = descriptor
            .to_json()
            .map_err(|e| descriptor_err(&self.path, "serialize", e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| descriptor_err(parent, "create", e))?;
        }

        let tmp = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = std::fs::remove_file(&tmp);
            return Err(descriptor_err(&tmp, "write", e));
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            descriptor_err(&self.path, "install", e)
        })?;

        tracing::info!(
            path = %self.path.display(),
            peers = descriptor.peers.len(),
            "network descriptor written"
        );
        Ok(descriptor)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
