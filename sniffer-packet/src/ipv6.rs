//! IPv6 header parsing

use std::net::Ipv6Addr;

use crate::error::ParseError;
use crate::ipv4::IpProtocol;

const HOP_BY_HOP: u8 = 0;
const ROUTING: u8 = 43;
const FRAGMENT: u8 = 44;
const DESTINATION_OPTIONS: u8 = 60;

/// Borrowed view of an IPv6 packet
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Packet<'a> {
    /// Payload length as declared in the header
    pub payload_length: u16,
    /// Next header of the fixed header
    pub next_header: u8,
    /// Hop limit
    pub hop_limit: u8,
    /// Source address
    pub source: Ipv6Addr,
    /// Destination address
    pub destination: Ipv6Addr,
    /// Payload (extension headers included), bounded by `payload_length`
    pub payload: &'a [u8],
    /// The capture holds fewer bytes than `payload_length` declares
    pub truncated: bool,
}

/// Upper-layer protocol found after skipping extension headers
#[derive(Debug, Clone, Copy)]
pub struct UpperLayer<'a> {
    pub protocol: IpProtocol,
    pub payload: &'a [u8],
    /// Offset of the fragment header crossed on the way, 0 if none
    pub fragment_offset: u16,
}

impl<'a> Ipv6Packet<'a> {
    /// Fixed IPv6 header size
    pub const HEADER_SIZE: usize = 40;

    /// Parse an IPv6 packet from bytes
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(ParseError::truncated("IPv6", Self::HEADER_SIZE, data.len()));
        }

        let version = data[0] >> 4;
        if version != 6 {
            return Err(ParseError::malformed("IPv6", format!("version {}", version)));
        }

        let payload_length = u16::from_be_bytes([data[4], data[5]]);
        let next_header = data[6];
        let hop_limit = data[7];

        let mut src = [0u8; 16];
        src.copy_from_slice(&data[8..24]);
        let mut dst = [0u8; 16];
        dst.copy_from_slice(&data[24..40]);

        let end = Self::HEADER_SIZE + payload_length as usize;
        let (payload, truncated) = if end <= data.len() {
            (&data[Self::HEADER_SIZE..end], false)
        } else {
            (&data[Self::HEADER_SIZE..], true)
        };

        Ok(Ipv6Packet {
            payload_length,
            next_header,
            hop_limit,
            source: Ipv6Addr::from(src),
            destination: Ipv6Addr::from(dst),
            payload,
            truncated,
        })
    }

    /// Walk hop-by-hop, routing, fragment and destination-options headers
    /// to the first upper-layer header
    pub fn upper_layer(&self) -> Result<UpperLayer<'a>, ParseError> {
        let mut next = self.next_header;
        let mut rest = self.payload;
        let mut fragment_offset = 0;

        loop {
            match next {
                HOP_BY_HOP | ROUTING | DESTINATION_OPTIONS => {
                    if rest.len() < 8 {
                        return Err(ParseError::truncated("IPv6 extension", 8, rest.len()));
                    }
                    let len = (rest[1] as usize + 1) * 8;
                    if rest.len() < len {
                        return Err(ParseError::truncated("IPv6 extension", len, rest.len()));
                    }
                    next = rest[0];
                    rest = &rest[len..];
                }
                FRAGMENT => {
                    if rest.len() < 8 {
                        return Err(ParseError::truncated("IPv6 fragment", 8, rest.len()));
                    }
                    fragment_offset = u16::from_be_bytes([rest[2], rest[3]]) >> 3;
                    next = rest[0];
                    rest = &rest[8..];
                }
                protocol => {
                    return Ok(UpperLayer {
                        protocol: IpProtocol::from_u8(protocol),
                        payload: rest,
                        fragment_offset,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(payload_length: u16, next_header: u8) -> Vec<u8> {
        let mut data = vec![0x60, 0x00, 0x00, 0x00];
        data.extend_from_slice(&payload_length.to_be_bytes());
        data.push(next_header);
        data.push(64);
        data.extend_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
        data.extend_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
        data
    }

    #[test]
    fn test_ipv6_parse() {
        let mut data = header(4, 17);
        data.extend_from_slice(&[1, 2, 3, 4]);

        let packet = Ipv6Packet::parse(&data).unwrap();
        assert_eq!(packet.source.to_string(), "2001:db8::1");
        assert_eq!(packet.destination.to_string(), "2001:db8::2");
        assert_eq!(packet.hop_limit, 64);
        assert_eq!(packet.payload, &[1, 2, 3, 4]);

        let upper = packet.upper_layer().unwrap();
        assert_eq!(upper.protocol, IpProtocol::UDP);
        assert_eq!(upper.fragment_offset, 0);
    }

    #[test]
    fn test_ipv6_skips_extension_headers() {
        // Hop-by-hop (8 bytes) then TCP
        let mut data = header(12, HOP_BY_HOP);
        data.extend_from_slice(&[6, 0, 0, 0, 0, 0, 0, 0]);
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);

        let packet = Ipv6Packet::parse(&data).unwrap();
        let upper = packet.upper_layer().unwrap();
        assert_eq!(upper.protocol, IpProtocol::TCP);
        assert_eq!(upper.payload, &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_ipv6_later_fragment() {
        let mut data = header(8, FRAGMENT);
        // next header UDP, offset 185 (<< 3)
        data.extend_from_slice(&[17, 0, 0x05, 0xC8, 0, 0, 0, 1]);

        let packet = Ipv6Packet::parse(&data).unwrap();
        let upper = packet.upper_layer().unwrap();
        assert_eq!(upper.fragment_offset, 185);
    }

    #[test]
    fn test_ipv6_truncated_extension() {
        let mut data = header(4, ROUTING);
        data.extend_from_slice(&[6, 0, 0, 0]);

        let packet = Ipv6Packet::parse(&data).unwrap();
        assert!(packet.upper_layer().is_err());
    }

    #[test]
    fn test_ipv6_rejects_v4() {
        let mut data = header(0, 6);
        data[0] = 0x45;
        assert!(Ipv6Packet::parse(&data).is_err());
    }
}
