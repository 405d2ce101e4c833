//! Frame decoding library for the packet sniffer
//!
//! This crate turns captured link-layer frames into [`DecodedRecord`]s. It
//! includes zero-copy header views for:
//!
//! - **Ethernet II** frames (no VLAN/MPLS/PPPoE following)
//! - **IPv4** packets, bounded by the declared total length
//! - **IPv6** packets, walking hop-by-hop, routing, fragment and
//!   destination-options extension headers
//! - **TCP** segments and **UDP** datagrams
//!
//! # Architecture
//!
//! - [`decode`] - Total frame decoder producing a record plus warnings
//! - [`ethernet`] - Ethernet II header view and EtherTypes
//! - [`ipv4`] - IPv4 header view and IP protocol numbers
//! - [`ipv6`] - IPv6 header view and extension header walk
//! - [`tcp`] - TCP header view
//! - [`udp`] - UDP header view
//!
//! # Quick Start
//!
//! ```rust
//! use sniffer_core::{LinkType, RawFrame};
//! use sniffer_packet::decode;
//!
//! let frame = RawFrame::new("eth0", LinkType::Other(113), vec![0u8; 16]);
//! let record = decode(&frame);
//!
//! assert!(record.link.is_none());
//! assert!(record.has_warning("unsupported-link-type"));
//! ```
//!
//! Decoding never fails. Layers that cannot be decoded are left empty and a
//! [`DecodeWarning`](sniffer_core::DecodeWarning) explains why.

pub mod decode;
pub mod error;
pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;

pub use decode::decode;
pub use error::ParseError;
pub use ethernet::{EtherType, EthernetFrame};
pub use ipv4::{IpProtocol, Ipv4Packet};
pub use ipv6::{Ipv6Packet, UpperLayer};
pub use sniffer_core::DecodedRecord;
pub use tcp::TcpSegment;
pub use udp::UdpDatagram;
