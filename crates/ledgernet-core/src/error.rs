//! Error types for network bootstrap

use std::time::Duration;

use thiserror::Error;

/// Bootstrap errors
///
/// Every variant is fatal for the run: nothing in the bootstrap retries or
/// downgrades an error.
#[derive(Error, Debug)]
pub enum NetError {
    // Validation errors
    #[error("Invalid run configuration: {0}")]
    Validation(String),

    // Resource errors
    #[error("Port reservation failed on {host}: {reason}")]
    PortReservation { host: String, reason: String },

    #[error("Insufficient credentials: {required} peers requested, {available} available")]
    InsufficientCredentials { required: usize, available: usize },

    #[error("Credential store unavailable: {0}")]
    Credentials(String),

    // Launch errors
    #[error("Failed to launch {node}: {reason}")]
    Launch { node: String, reason: String },

    // Readiness errors
    #[error("{node} did not accept connections on {addr} within {timeout:?}")]
    ReadinessTimeout {
        node: String,
        addr: String,
        timeout: Duration,
    },

    // Descriptor errors
    #[error("Descriptor error: {0}")]
    Descriptor(String),
}

/// Coarse classification of a [`NetError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range run configuration
    Validation,
    /// Port bind failure or credential shortfall
    Resource,
    /// Process spawn failure
    Launch,
    /// A service never became reachable
    ReadinessTimeout,
    /// Descriptor could not be persisted
    Descriptor,
}

impl NetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::Validation(_) => ErrorKind::Validation,
            NetError::PortReservation { .. }
            | NetError::InsufficientCredentials { .. }
            | NetError::Credentials(_) => ErrorKind::Resource,
            NetError::Launch { .. } => ErrorKind::Launch,
            NetError::ReadinessTimeout { .. } => ErrorKind::ReadinessTimeout,
            NetError::Descriptor(_) => ErrorKind::Descriptor,
        }
    }

    /// Identifier of the node the error is about, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            NetError::Launch { node, .. } | NetError::ReadinessTimeout { node, .. } => {
                Some(node.as_str())
            }
            _ => None,
        }
    }
}

/// Result type for bootstrap operations
pub type NetResult<T> = Result<T, NetError>;
