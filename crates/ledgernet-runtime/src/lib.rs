//! Ledgernet Runtime - Network bootstrap orchestration
//!
//! A run proceeds in fixed stages:
//! 1. Validate the configuration and resolve credentials
//! 2. Reserve every node's ports
//! 3. Launch the membership service and wait for it (security only)
//! 4. Launch peers in index order
//! 5. Wait for every peer's REST endpoint
//! 6. Write the network descriptor

pub mod progress;
pub mod orchestrator;

pub use progress::*;
pub use orchestrator::*;
