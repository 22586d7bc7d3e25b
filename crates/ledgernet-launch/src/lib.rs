//! Ledgernet Launch - Turning planned nodes into running processes
//!
//! This crate provides:
//! - Per-process environment composition
//! - Enrollment credential lookup
//! - Process spawning with log redirection

pub mod env;
pub mod credentials;
pub mod launcher;

pub use env::*;
pub use credentials::*;
pub use launcher::*;
