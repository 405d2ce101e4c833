//! IPv4 header parsing

use sniffer_core::ip_protocols;
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::ParseError;

/// IP protocol / IPv6 next-header numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// IGMP (2)
    IGMP,
    /// IPv4-in-IP (4)
    IPIP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// IPv6-in-IP (41)
    IPv6,
    /// GRE (47)
    GRE,
    /// ESP (50)
    ESP,
    /// AH (51)
    AH,
    /// ICMPv6 (58)
    ICMPv6,
    /// SCTP (132)
    SCTP,
    /// Any other protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn from_u8(value: u8) -> Self {
        match value {
            ip_protocols::ICMP => IpProtocol::ICMP,
            ip_protocols::IGMP => IpProtocol::IGMP,
            ip_protocols::IPIP => IpProtocol::IPIP,
            ip_protocols::TCP => IpProtocol::TCP,
            ip_protocols::UDP => IpProtocol::UDP,
            ip_protocols::IPV6 => IpProtocol::IPv6,
            ip_protocols::GRE => IpProtocol::GRE,
            ip_protocols::ESP => IpProtocol::ESP,
            ip_protocols::AH => IpProtocol::AH,
            ip_protocols::ICMPV6 => IpProtocol::ICMPv6,
            ip_protocols::SCTP => IpProtocol::SCTP,
            val => IpProtocol::Custom(val),
        }
    }

    /// Whether the payload is another IP packet or a tunnel
    pub fn is_encapsulation(self) -> bool {
        matches!(self, IpProtocol::IPIP | IpProtocol::IPv6 | IpProtocol::GRE)
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpProtocol::ICMP => write!(f, "ICMP"),
            IpProtocol::IGMP => write!(f, "IGMP"),
            IpProtocol::IPIP => write!(f, "IP-in-IP"),
            IpProtocol::TCP => write!(f, "TCP"),
            IpProtocol::UDP => write!(f, "UDP"),
            IpProtocol::IPv6 => write!(f, "IPv6-in-IP"),
            IpProtocol::GRE => write!(f, "GRE"),
            IpProtocol::ESP => write!(f, "ESP"),
            IpProtocol::AH => write!(f, "AH"),
            IpProtocol::ICMPv6 => write!(f, "ICMPv6"),
            IpProtocol::SCTP => write!(f, "SCTP"),
            IpProtocol::Custom(val) => write!(f, "protocol {}", val),
        }
    }
}

/// Borrowed view of an IPv4 packet
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Packet<'a> {
    /// Internet Header Length in 32-bit words
    pub ihl: u8,
    /// Total length (header + data) as declared in the header
    pub total_length: u16,
    /// Fragment offset (in 8-byte blocks)
    pub fragment_offset: u16,
    /// More Fragments flag
    pub more_fragments: bool,
    /// Time to Live
    pub ttl: u8,
    /// Protocol
    pub protocol: IpProtocol,
    /// Source IP address
    pub source: Ipv4Addr,
    /// Destination IP address
    pub destination: Ipv4Addr,
    /// Payload, bounded by `total_length` when the capture holds all of it
    pub payload: &'a [u8],
    /// The capture holds fewer bytes than `total_length` declares
    pub truncated: bool,
}

impl<'a> Ipv4Packet<'a> {
    /// Minimum IPv4 header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Parse an IPv4 packet from bytes
    ///
    /// Trailing bytes beyond `total_length` (Ethernet padding) are not part of
    /// the payload.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(ParseError::truncated("IPv4", Self::MIN_HEADER_SIZE, data.len()));
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;

        if version != 4 {
            return Err(ParseError::malformed("IPv4", format!("version {}", version)));
        }
        if (ihl as usize) * 4 < Self::MIN_HEADER_SIZE {
            return Err(ParseError::malformed("IPv4", format!("IHL {} below minimum", ihl)));
        }

        let header_len = (ihl as usize) * 4;
        if data.len() < header_len {
            return Err(ParseError::truncated("IPv4", header_len, data.len()));
        }

        // Segmentation-offloaded packets are captured with total length 0; use what was captured
        let total_length = u16::from_be_bytes([data[2], data[3]]);
        let end = match total_length as usize {
            0 => data.len(),
            len if len < header_len => {
                return Err(ParseError::malformed(
                    "IPv4",
                    format!("total length {} shorter than header {}", len, header_len),
                ))
            }
            len => len,
        };

        let flags_and_offset = u16::from_be_bytes([data[6], data[7]]);
        let more_fragments = flags_and_offset & 0x2000 != 0;
        let fragment_offset = flags_and_offset & 0x1FFF;

        let ttl = data[8];
        let protocol = IpProtocol::from_u8(data[9]);
        let source = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
        let destination = Ipv4Addr::new(data[16], data[17], data[18], data[19]);

        let (payload, truncated) = if end <= data.len() {
            (&data[header_len..end], false)
        } else {
            (&data[header_len..], true)
        };

        Ok(Ipv4Packet {
            ihl,
            total_length,
            fragment_offset,
            more_fragments,
            ttl,
            protocol,
            source,
            destination,
            payload,
            truncated,
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }
}
