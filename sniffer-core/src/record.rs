//! Decoded record model
//!
//! A [`DecodedRecord`] is the unit that flows from the decoder to the sink.
//! Its serialized form is the document shape stored downstream:
//!
//! ```json
//! {
//!   "captured_at": "2024-05-01T10:00:00Z",
//!   "link": { "layer_type": "Ethernet", "src_mac": "00:11:22:33:44:55", "dst_mac": "aa:bb:cc:dd:ee:ff" },
//!   "network": { "layer_type": "IPv4", "src_ip": "192.168.1.1", "dst_ip": "192.168.1.2" },
//!   "transport": { "layer_type": "TCP", "src_port": "12345", "dst_port": "80" },
//!   "application_payload": "GET / HTTP/1.1\r\n",
//!   "decode_warnings": ["truncated-frame: captured 96 of 1514 bytes"]
//! }
//! ```
//!
//! Layer fields and `application_payload` are omitted when absent,
//! `decode_warnings` when empty.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::{LinkType, MacAddr};

/// Link layer summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet { src_mac: MacAddr, dst_mac: MacAddr },
}

impl LinkLayer {
    pub fn layer_type(&self) -> &'static str {
        match self {
            LinkLayer::Ethernet { .. } => "Ethernet",
        }
    }
}

impl Serialize for LinkLayer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let LinkLayer::Ethernet { src_mac, dst_mac } = self;
        let mut s = serializer.serialize_struct("LinkLayer", 3)?;
        s.serialize_field("layer_type", self.layer_type())?;
        s.serialize_field("src_mac", &src_mac.to_string())?;
        s.serialize_field("dst_mac", &dst_mac.to_string())?;
        s.end()
    }
}

/// Network layer summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ipv4 { src: Ipv4Addr, dst: Ipv4Addr },
    Ipv6 { src: Ipv6Addr, dst: Ipv6Addr },
}

impl NetworkLayer {
    pub fn layer_type(&self) -> &'static str {
        match self {
            NetworkLayer::Ipv4 { .. } => "IPv4",
            NetworkLayer::Ipv6 { .. } => "IPv6",
        }
    }

    /// Source address in canonical text form
    pub fn src_ip(&self) -> String {
        match self {
            NetworkLayer::Ipv4 { src, .. } => src.to_string(),
            NetworkLayer::Ipv6 { src, .. } => src.to_string(),
        }
    }

    /// Destination address in canonical text form
    pub fn dst_ip(&self) -> String {
        match self {
            NetworkLayer::Ipv4 { dst, .. } => dst.to_string(),
            NetworkLayer::Ipv6 { dst, .. } => dst.to_string(),
        }
    }
}

impl Serialize for NetworkLayer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NetworkLayer", 3)?;
        s.serialize_field("layer_type", self.layer_type())?;
        s.serialize_field("src_ip", &self.src_ip())?;
        s.serialize_field("dst_ip", &self.dst_ip())?;
        s.end()
    }
}

/// Transport layer summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportLayer {
    Tcp { src_port: u16, dst_port: u16 },
    Udp { src_port: u16, dst_port: u16 },
}

impl TransportLayer {
    pub fn layer_type(&self) -> &'static str {
        match self {
            TransportLayer::Tcp { .. } => "TCP",
            TransportLayer::Udp { .. } => "UDP",
        }
    }

    pub fn ports(&self) -> (u16, u16) {
        match *self {
            TransportLayer::Tcp { src_port, dst_port } => (src_port, dst_port),
            TransportLayer::Udp { src_port, dst_port } => (src_port, dst_port),
        }
    }
}

impl Serialize for TransportLayer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (src_port, dst_port) = self.ports();
        let mut s = serializer.serialize_struct("TransportLayer", 3)?;
        s.serialize_field("layer_type", self.layer_type())?;
        s.serialize_field("src_port", &src_port.to_string())?;
        s.serialize_field("dst_port", &dst_port.to_string())?;
        s.end()
    }
}

/// Protocol layer a warning refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Link,
    Network,
    Transport,
}

/// A non-fatal problem found while decoding a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// The capture device uses a link type the decoder does not understand
    UnsupportedLinkType(LinkType),
    /// The frame has no link header (raw IP capture)
    NoLinkLayer(LinkType),
    /// Ethertype is not IPv4/IPv6 (ARP, LLDP, ...)
    UnsupportedNetworkProtocol(String),
    /// VLAN tags, IP-in-IP, GRE and similar nesting is not followed
    UnsupportedEncapsulation(String),
    /// IP payload is not TCP/UDP
    UnsupportedTransportProtocol(String),
    /// A header was cut short
    Truncated { layer: Layer, detail: String },
    /// A header is present but inconsistent
    Malformed { layer: Layer, detail: String },
    /// Non-initial IP fragment, so no transport header is present
    Fragment { offset: u16 },
    /// The snapshot length cut the frame short
    TruncatedFrame { captured: usize, original: usize },
}

impl DecodeWarning {
    /// Stable tag identifying the warning kind
    pub fn tag(&self) -> &'static str {
        match self {
            DecodeWarning::UnsupportedLinkType(_) => "unsupported-link-type",
            DecodeWarning::NoLinkLayer(_) => "no-link-layer",
            DecodeWarning::UnsupportedNetworkProtocol(_) => "unsupported-network-protocol",
            DecodeWarning::UnsupportedEncapsulation(_) => "unsupported-encapsulation",
            DecodeWarning::UnsupportedTransportProtocol(_) => "unsupported-transport-protocol",
            DecodeWarning::Truncated { layer, .. } => match layer {
                Layer::Link => "truncated-link-layer",
                Layer::Network => "truncated-network-layer",
                Layer::Transport => "truncated-transport-layer",
            },
            DecodeWarning::Malformed { layer, .. } => match layer {
                Layer::Link => "malformed-link-layer",
                Layer::Network => "malformed-network-layer",
                Layer::Transport => "malformed-transport-layer",
            },
            DecodeWarning::Fragment { .. } => "ip-fragment",
            DecodeWarning::TruncatedFrame { .. } => "truncated-frame",
        }
    }
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        match self {
            DecodeWarning::UnsupportedLinkType(link) | DecodeWarning::NoLinkLayer(link) => {
                write!(f, "{}: {}", tag, link)
            }
            DecodeWarning::UnsupportedNetworkProtocol(name)
            | DecodeWarning::UnsupportedEncapsulation(name)
            | DecodeWarning::UnsupportedTransportProtocol(name) => write!(f, "{}: {}", tag, name),
            DecodeWarning::Truncated { detail, .. } | DecodeWarning::Malformed { detail, .. } => {
                write!(f, "{}: {}", tag, detail)
            }
            DecodeWarning::Fragment { offset } => write!(f, "{}: offset {}", tag, offset),
            DecodeWarning::TruncatedFrame { captured, original } => {
                write!(f, "{}: captured {} of {} bytes", tag, captured, original)
            }
        }
    }
}

impl Serialize for DecodeWarning {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structured per-packet metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    pub captured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_payload: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decode_warnings: Vec<DecodeWarning>,
}

impl DecodedRecord {
    /// Create an empty record for a frame captured at `captured_at`
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            link: None,
            network: None,
            transport: None,
            application_payload: None,
            decode_warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: DecodeWarning) {
        self.decode_warnings.push(warning);
    }

    /// Check whether any warning carries `tag`
    pub fn has_warning(&self, tag: &str) -> bool {
        self.decode_warnings.iter().any(|w| w.tag() == tag)
    }

    /// True when no link, network or transport layer was identified
    pub fn is_bare(&self) -> bool {
        self.link.is_none() && self.network.is_none() && self.transport.is_none()
    }
}
