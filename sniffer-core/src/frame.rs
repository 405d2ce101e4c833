//! Raw captured frames

use chrono::{DateTime, Utc};
use std::fmt;

/// Link-layer type reported by the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// Ethernet II / 802.3 (DLT_EN10MB)
    Ethernet,
    /// Bare IPv4 or IPv6 with no link header (DLT_RAW and friends)
    Raw,
    /// Any other datalink type, by its DLT number
    Other(i32),
}

impl LinkType {
    /// Map a pcap DLT number to a link type
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkType::Ethernet,
            // DLT_RAW differs per platform; 101 is LINKTYPE_RAW, 228/229 are IPv4/IPv6-only
            12 | 14 | 101 | 228 | 229 => LinkType::Raw,
            other => LinkType::Other(other),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Ethernet => write!(f, "Ethernet"),
            LinkType::Raw => write!(f, "RAW"),
            LinkType::Other(dlt) => write!(f, "DLT {}", dlt),
        }
    }
}

/// A captured frame as handed over by the capture device
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// When the frame was captured
    pub captured_at: DateTime<Utc>,
    /// Interface the frame was received on
    pub interface: String,
    /// Link-layer framing of `data`
    pub link_type: LinkType,
    /// Captured bytes (at most the snapshot length)
    pub data: Vec<u8>,
    /// Length of the frame on the wire (may exceed `data.len()` if truncated)
    pub original_len: usize,
}

impl RawFrame {
    /// Create a frame captured now, with `original_len` equal to the captured length
    pub fn new(interface: impl Into<String>, link_type: LinkType, data: Vec<u8>) -> Self {
        let original_len = data.len();
        Self {
            captured_at: Utc::now(),
            interface: interface.into(),
            link_type,
            data,
            original_len,
        }
    }

    /// Override the capture timestamp
    pub fn with_timestamp(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    /// Override the on-wire length
    pub fn with_original_len(mut self, original_len: usize) -> Self {
        self.original_len = original_len;
        self
    }

    /// Get frame data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of captured bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no bytes were captured
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the snapshot length cut the frame short
    pub fn is_truncated(&self) -> bool {
        self.original_len > self.data.len()
    }
}
