//! Sniffer Core Library
//!
//! This crate provides the fundamental types and error handling shared by
//! the capture, decode, sink and pipeline crates: raw frames, the decoded
//! record model and the workspace error type.

pub mod error;
pub mod frame;
pub mod record;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use frame::{LinkType, RawFrame};
pub use record::{DecodeWarning, DecodedRecord, Layer, LinkLayer, NetworkLayer, TransportLayer};
pub use types::*;
