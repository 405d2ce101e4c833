//! Ethernet frame parsing
//!
//! Parses Ethernet II and 802.3 headers without copying the payload.

use sniffer_core::{ethertypes, MacAddr};
use std::fmt;

use crate::error::ParseError;

/// Common EtherType values used in Ethernet II frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// Reverse ARP (0x8035)
    RARP,
    /// VLAN-tagged frame (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// MPLS unicast (0x8847)
    MPLS,
    /// MPLS multicast (0x8848)
    MPLSMulticast,
    /// PPPoE Discovery (0x8863)
    PPPoEDiscovery,
    /// PPPoE Session (0x8864)
    PPPoESession,
    /// LLDP (0x88CC)
    LLDP,
    /// 802.1X (0x888E)
    Dot1X,
    /// Q-in-Q/802.1ad (0x88A8)
    QinQ,
    /// 802.3 frame: the type field holds a length and an LLC header follows
    LLC,
    /// Anything else
    Custom(u16),
}

impl EtherType {
    /// Interpret the 16-bit type/length field
    pub fn from_u16(value: u16) -> Self {
        match value {
            // Values <= 1500 are 802.3 lengths, not EtherTypes
            0..=1500 => EtherType::LLC,
            ethertypes::IPV4 => EtherType::IPv4,
            ethertypes::ARP => EtherType::ARP,
            ethertypes::RARP => EtherType::RARP,
            ethertypes::DOT1Q => EtherType::VLAN,
            ethertypes::IPV6 => EtherType::IPv6,
            ethertypes::MPLS_UNICAST => EtherType::MPLS,
            ethertypes::MPLS_MULTICAST => EtherType::MPLSMulticast,
            0x8863 => EtherType::PPPoEDiscovery,
            0x8864 => EtherType::PPPoESession,
            0x88CC => EtherType::LLDP,
            0x888E => EtherType::Dot1X,
            ethertypes::QINQ => EtherType::QinQ,
            val => EtherType::Custom(val),
        }
    }

    /// Whether this EtherType wraps another Ethernet payload (tags, label stacks, tunnels)
    pub fn is_encapsulation(self) -> bool {
        matches!(
            self,
            EtherType::VLAN
                | EtherType::QinQ
                | EtherType::MPLS
                | EtherType::MPLSMulticast
                | EtherType::PPPoESession
        )
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::RARP => write!(f, "RARP"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::MPLS => write!(f, "MPLS"),
            EtherType::MPLSMulticast => write!(f, "MPLS-Multicast"),
            EtherType::PPPoEDiscovery => write!(f, "PPPoE-Discovery"),
            EtherType::PPPoESession => write!(f, "PPPoE-Session"),
            EtherType::LLDP => write!(f, "LLDP"),
            EtherType::Dot1X => write!(f, "802.1X"),
            EtherType::QinQ => write!(f, "Q-in-Q"),
            EtherType::LLC => write!(f, "LLC"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// Borrowed view of an Ethernet frame
#[derive(Debug, Clone, Copy)]
pub struct EthernetFrame<'a> {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// EtherType or 802.3 length marker
    pub ethertype: EtherType,
    /// Everything after the 14-byte header
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Ethernet header size (dst + src + type/length)
    pub const HEADER_SIZE: usize = 14;

    /// Parse an Ethernet frame from bytes
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(ParseError::truncated("Ethernet", Self::HEADER_SIZE, data.len()));
        }

        let destination = MacAddr([data[0], data[1], data[2], data[3], data[4], data[5]]);
        let source = MacAddr([data[6], data[7], data[8], data[9], data[10], data[11]]);
        let ethertype = EtherType::from_u16(u16::from_be_bytes([data[12], data[13]]));

        Ok(EthernetFrame {
            destination,
            source,
            ethertype,
            payload: &data[Self::HEADER_SIZE..],
        })
    }
}
