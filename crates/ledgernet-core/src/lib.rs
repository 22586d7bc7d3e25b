//! Ledgernet Core - Fundamental types for local test networks
//!
//! This crate defines the types shared by every stage of a network bootstrap:
//! - Node planning (NodeSpec, NodeRole, NodeState)
//! - Service endpoints (ServiceRole, PortSet)
//! - Run configuration and consensus mode tables
//! - The error taxonomy

pub mod node;
pub mod ports;
pub mod config;
pub mod error;

pub use node::*;
pub use ports::*;
pub use config::*;
pub use error::*;
