//! Packet capture library for the packet sniffer
//!
//! This crate wraps pcap to provide a blocking source of raw frames.
//!
//! ## Features
//!
//! - **Interface Lookup**: Resolve and list network interfaces
//! - **Filters**: Optional BPF filter; a rejected filter degrades to an unfiltered capture
//! - **Statistics**: Frame and byte counters plus driver drop counters
//! - **Substitutable**: The pipeline reads through the [`FrameSource`] trait
//!
//! ## Example
//!
//! ```no_run
//! use sniffer_capture::{CaptureSource, FrameSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut capture = CaptureSource::open("eth0", Some("tcp port 80"))?;
//!
//! for frame in capture.frames().take(10) {
//!     let frame = frame?;
//!     println!("Got frame: {} bytes", frame.len());
//! }
//!
//! capture.close();
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod interface;
pub mod stats;

// Re-export main types
pub use capture::{
    CaptureConfig, CaptureHandle, CaptureSource, FilterStatus, FrameSource, Frames, NextFrame,
};
pub use interface::{get_interface, list_interfaces, resolve_interface, InterfaceInfo};
pub use stats::{CaptureStats, DeviceStats, StatsAccumulator};
