//! Ledgernet Transport - Ports and readiness
//!
//! This crate provides:
//! - Ephemeral port reservation held until launch
//! - TCP readiness polling with a hard deadline

pub mod ports;
pub mod readiness;

pub use ports::*;
pub use readiness::*;
