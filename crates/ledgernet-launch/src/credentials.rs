//! Enrollment credentials
//!
//! With security enabled, peer `i` enrolls with the `i`-th credential of the
//! store. Where the credentials come from is up to the operator.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use ledgernet_core::{NetError, NetResult};

/// Enrollment identity and secret for one peer
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub id: String,
    pub secret: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Source of enrollment credentials, indexed by peer
pub trait CredentialStore {
    /// Credential for peer `index`
    fn credential(&self, index: usize) -> Option<Credential>;

    /// Number of credentials available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve one credential per peer, failing if the store runs short
    fn resolve(&self, peer_count: usize) -> NetResult<Vec<Credential>> {
        if self.len() < peer_count {
            return Err(NetError::InsufficientCredentials {
                required: peer_count,
                available: self.len(),
            });
        }
        (0..peer_count)
            .map(|i| {
                self.credential(i)
                    .ok_or(NetError::InsufficientCredentials {
                        required: peer_count,
                        available: i,
                    })
            })
            .collect()
    }
}

/// Credentials held in memory
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    entries: Vec<Credential>,
}

impl StaticCredentials {
    pub fn new(entries: Vec<Credential>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl CredentialStore for StaticCredentials {
    fn credential(&self, index: usize) -> Option<Credential> {
        self.entries.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Credentials loaded from a JSON file: `[{"id": "...", "secret": "..."}, ...]`
#[derive(Clone, Debug)]
pub struct CredentialFile {
    inner: StaticCredentials,
}

impl CredentialFile {
    pub fn load(path: &Path) -> NetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NetError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
            .map_err(|e| NetError::Credentials(format!("{}: {}", path.display(), e)))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let entries: Vec<Credential> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if let Some(pos) = entries
            .iter()
            .position(|c| c.id.is_empty() || c.secret.is_empty())
        {
            return Err(format!("entry {} has an empty id or secret", pos));
        }
        Ok(Self {
            inner: StaticCredentials::new(entries),
        })
    }
}

impl CredentialStore for CredentialFile {
    fn credential(&self, index: usize) -> Option<Credential> {
        self.inner.credential(index)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> StaticCredentials {
        StaticCredentials::new(
            (0..count)
                .map(|i| Credential::new(format!("test_vp{}", i), format!("secret{}", i)))
                .collect(),
        )
    }

    #[test]
    fn test_resolve_by_index() {
        let store = numbered(4);
        let resolved = store.resolve(3).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[2].id, "test_vp2");
    }

    #[test]
    fn test_resolve_shortfall() {
        let err = numbered(2).resolve(4).unwrap_err();
        match err {
            NetError::InsufficientCredentials {
                required,
                available,
            } => {
                assert_eq!(required, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        let debug = format!("{:?}", Credential::new("u", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_parse_file_contents() {
        let parsed = CredentialFile::parse(
            r#"[{"id": "test_vp0", "secret": "a"}, {"id": "test_vp1", "secret": "b"}]"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.credential(1).unwrap().secret, "b");

        assert!(CredentialFile::parse(r#"[{"id": "", "secret": "a"}]"#).is_err());
        assert!(CredentialFile::parse("not json").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = CredentialFile::load(Path::new("/nonexistent/ledgernet/creds.json")).unwrap_err();
        assert_eq!(err.kind(), ledgernet_core::ErrorKind::Resource);
    }
}
