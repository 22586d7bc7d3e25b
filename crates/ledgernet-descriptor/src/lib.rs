//! Ledgernet Descriptor - Machine-readable description of a running network
//!
//! The descriptor is accumulated in memory while nodes start and written
//! exactly once, atomically, after every peer has been recorded.

pub mod document;
pub mod writer;

pub use document::*;
pub use writer::*;
