//! Descriptor document schema
//!
//! Field order is part of the format: client tooling reads the document
//! against a fixed schema, so the struct order below must not change.

use serde::{Deserialize, Serialize};

use ledgernet_core::PortSet;

/// Value of `networkMode` for networks started by this tool
pub const NETWORK_MODE_LOCAL: &str = "local";

/// Value of `createdBy`
pub const CREATED_BY: &str = "ledgernet";

/// Top-level network descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub network_mode: String,
    pub chaincode_mode: String,
    pub host: String,
    pub date: String,
    pub created_by: String,
    /// `"true"` or `"false"`
    pub security: String,
    pub consensus: String,
    /// `"true"` or `"false"`
    pub peer_profile_server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membersrvc: Option<MemberServiceRecord>,
    pub peers: Vec<PeerRecord>,
}

/// Membership service entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberServiceRecord {
    /// `host:port`
    pub service: String,
    pub pid: String,
}

/// Peer entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: String,
    pub grpc: String,
    pub rest: String,
    pub events: String,
    pub cli: String,
    pub profile: String,
    pub pid: String,
}

impl PeerRecord {
    pub fn new(id: &str, ports: &PortSet, pid: u32) -> Self {
        Self {
            id: id.to_string(),
            grpc: ports.grpc().to_string(),
            rest: ports.rest().to_string(),
            events: ports.events().to_string(),
            cli: ports.cli().to_string(),
            profile: ports.profile().to_string(),
            pid: pid.to_string(),
        }
    }

    /// Service addresses in slot order
    pub fn addresses(&self) -> [&str; 5] {
        [
            self.grpc.as_str(),
            self.rest.as_str(),
            self.events.as_str(),
            self.cli.as_str(),
            self.profile.as_str(),
        ]
    }
}

impl NetworkDescriptor {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(membersrvc: bool) -> NetworkDescriptor {
        NetworkDescriptor {
            network_mode: NETWORK_MODE_LOCAL.to_string(),
            chaincode_mode: "net".to_string(),
            host: "127.0.0.1".to_string(),
            date: "2026-10-18T00:00:00+00:00".to_string(),
            created_by: CREATED_BY.to_string(),
            security: membersrvc.to_string(),
            consensus: "noops".to_string(),
            peer_profile_server: "false".to_string(),
            membersrvc: membersrvc.then(|| MemberServiceRecord {
                service: "127.0.0.1:7054".to_string(),
                pid: "100".to_string(),
            }),
            peers: vec![PeerRecord {
                id: "vp0".to_string(),
                grpc: "127.0.0.1:1".to_string(),
                rest: "127.0.0.1:2".to_string(),
                events: "127.0.0.1:3".to_string(),
                cli: "127.0.0.1:4".to_string(),
                profile: "127.0.0.1:5".to_string(),
                pid: "101".to_string(),
            }],
        }
    }

    #[test]
    fn test_field_order() {
        let json = sample(true).to_json().unwrap();
        let keys = [
            "\"networkMode\"",
            "\"chaincodeMode\"",
            "\"host\"",
            "\"date\"",
            "\"createdBy\"",
            "\"security\"",
            "\"consensus\"",
            "\"peerProfileServer\"",
            "\"membersrvc\"",
            "\"peers\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
    }

    #[test]
    fn test_membersrvc_omitted_without_security() {
        let json = sample(false).to_json().unwrap();
        assert!(!json.contains("membersrvc"));
        assert_eq!(NetworkDescriptor::from_json(&json).unwrap(), sample(false));
    }

    #[test]
    fn test_flags_are_strings() {
        let json = sample(true).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["security"], serde_json::json!("true"));
        assert_eq!(value["peerProfileServer"], serde_json::json!("false"));
        assert_eq!(value["peers"][0]["pid"], serde_json::json!("101"));
        assert_eq!(value["membersrvc"]["service"], serde_json::json!("127.0.0.1:7054"));
    }
}
