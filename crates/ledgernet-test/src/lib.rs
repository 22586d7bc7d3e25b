//! Ledgernet Test Harness - Bootstrap validation without real node binaries
//!
//! This crate provides:
//! - A fake spawner that stands up in-process listeners in place of nodes
//! - Run configurations isolated under the system temp directory
//! - End-to-end bootstrap scenarios

pub mod fake_spawner;
pub mod harness;

#[cfg(test)]
mod scenarios;

pub use fake_spawner::*;
pub use harness::*;
