//! Frame decoder
//!
//! [`decode`] turns a [`RawFrame`] into a [`DecodedRecord`]. It never fails:
//! anything that cannot be parsed becomes a [`DecodeWarning`] on the record
//! and the remaining layers are still attempted where their input is known.
//!
//! Application payload bytes are decoded as lossy UTF-8: invalid sequences
//! are replaced with U+FFFD, so the stored text is always valid UTF-8.

use sniffer_core::{
    DecodeWarning, DecodedRecord, Layer, LinkLayer, LinkType, NetworkLayer, RawFrame,
    TransportLayer,
};

use crate::error::ParseError;
use crate::ethernet::{EtherType, EthernetFrame};
use crate::ipv4::{IpProtocol, Ipv4Packet};
use crate::ipv6::Ipv6Packet;
use crate::tcp::TcpSegment;
use crate::udp::UdpDatagram;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpVersion {
    V4,
    V6,
}

/// Decode a captured frame into a record
pub fn decode(frame: &RawFrame) -> DecodedRecord {
    let mut record = DecodedRecord::new(frame.captured_at);

    if frame.is_truncated() {
        record.warn(DecodeWarning::TruncatedFrame {
            captured: frame.len(),
            original: frame.original_len,
        });
    }

    let Some((version, network_bytes)) = decode_link(frame, &mut record) else {
        return record;
    };
    let Some((protocol, transport_bytes)) = decode_network(version, network_bytes, &mut record)
    else {
        return record;
    };
    let Some(application_bytes) = decode_transport(protocol, transport_bytes, &mut record) else {
        return record;
    };

    if !application_bytes.is_empty() {
        record.application_payload = Some(String::from_utf8_lossy(application_bytes).into_owned());
    }

    record
}

fn parse_warning(layer: Layer, err: ParseError) -> DecodeWarning {
    let detail = err.to_string();
    match err {
        ParseError::Truncated { .. } => DecodeWarning::Truncated { layer, detail },
        ParseError::Malformed { .. } => DecodeWarning::Malformed { layer, detail },
    }
}

fn decode_link<'a>(
    frame: &'a RawFrame,
    record: &mut DecodedRecord,
) -> Option<(IpVersion, &'a [u8])> {
    match frame.link_type {
        LinkType::Ethernet => {
            let ethernet = match EthernetFrame::parse(&frame.data) {
                Ok(ethernet) => ethernet,
                Err(e) => {
                    record.warn(parse_warning(Layer::Link, e));
                    return None;
                }
            };

            record.link = Some(LinkLayer::Ethernet {
                src_mac: ethernet.source,
                dst_mac: ethernet.destination,
            });

            match ethernet.ethertype {
                EtherType::IPv4 => Some((IpVersion::V4, ethernet.payload)),
                EtherType::IPv6 => Some((IpVersion::V6, ethernet.payload)),
                other if other.is_encapsulation() => {
                    record.warn(DecodeWarning::UnsupportedEncapsulation(other.to_string()));
                    None
                }
                other => {
                    record.warn(DecodeWarning::UnsupportedNetworkProtocol(other.to_string()));
                    None
                }
            }
        }
        LinkType::Raw => {
            record.warn(DecodeWarning::NoLinkLayer(frame.link_type));
            match frame.data.first().map(|b| b >> 4) {
                Some(4) => Some((IpVersion::V4, &frame.data[..])),
                Some(6) => Some((IpVersion::V6, &frame.data[..])),
                Some(version) => {
                    record.warn(DecodeWarning::UnsupportedNetworkProtocol(format!(
                        "IP version {}",
                        version
                    )));
                    None
                }
                None => {
                    record.warn(parse_warning(
                        Layer::Network,
                        ParseError::truncated("IP", 1, 0),
                    ));
                    None
                }
            }
        }
        LinkType::Other(_) => {
            record.warn(DecodeWarning::UnsupportedLinkType(frame.link_type));
            None
        }
    }
}

fn decode_network<'a>(
    version: IpVersion,
    data: &'a [u8],
    record: &mut DecodedRecord,
) -> Option<(IpProtocol, &'a [u8])> {
    let (protocol, payload, fragment_offset) = match version {
        IpVersion::V4 => {
            let packet = match Ipv4Packet::parse(data) {
                Ok(packet) => packet,
                Err(e) => {
                    record.warn(parse_warning(Layer::Network, e));
                    return None;
                }
            };

            record.network = Some(NetworkLayer::Ipv4 {
                src: packet.source,
                dst: packet.destination,
            });
            if packet.truncated {
                record.warn(DecodeWarning::Truncated {
                    layer: Layer::Network,
                    detail: format!(
                        "IPv4 total length {}, captured {}",
                        packet.total_length,
                        data.len()
                    ),
                });
            }

            (packet.protocol, packet.payload, packet.fragment_offset)
        }
        IpVersion::V6 => {
            let packet = match Ipv6Packet::parse(data) {
                Ok(packet) => packet,
                Err(e) => {
                    record.warn(parse_warning(Layer::Network, e));
                    return None;
                }
            };

            record.network = Some(NetworkLayer::Ipv6 {
                src: packet.source,
                dst: packet.destination,
            });
            if packet.truncated {
                record.warn(DecodeWarning::Truncated {
                    layer: Layer::Network,
                    detail: format!(
                        "IPv6 payload length {}, captured {}",
                        packet.payload_length,
                        packet.payload.len()
                    ),
                });
            }

            match packet.upper_layer() {
                Ok(upper) => (upper.protocol, upper.payload, upper.fragment_offset),
                Err(e) => {
                    record.warn(parse_warning(Layer::Network, e));
                    return None;
                }
            }
        }
    };

    if fragment_offset != 0 {
        record.warn(DecodeWarning::Fragment {
            offset: fragment_offset,
        });
        return None;
    }

    match protocol {
        IpProtocol::TCP | IpProtocol::UDP => Some((protocol, payload)),
        other if other.is_encapsulation() => {
            record.warn(DecodeWarning::UnsupportedEncapsulation(other.to_string()));
            None
        }
        other => {
            record.warn(DecodeWarning::UnsupportedTransportProtocol(other.to_string()));
            None
        }
    }
}

fn decode_transport<'a>(
    protocol: IpProtocol,
    data: &'a [u8],
    record: &mut DecodedRecord,
) -> Option<&'a [u8]> {
    let result = match protocol {
        IpProtocol::TCP => TcpSegment::parse(data).map(|segment| {
            record.transport = transport_layer(protocol, segment.source_port, segment.destination_port);
            segment.payload
        }),
        IpProtocol::UDP => UdpDatagram::parse(data).map(|datagram| {
            record.transport = transport_layer(protocol, datagram.source_port, datagram.destination_port);
            if datagram.truncated {
                record.warn(DecodeWarning::Truncated {
                    layer: Layer::Transport,
                    detail: format!(
                        "UDP length {}, captured {}",
                        datagram.length,
                        data.len()
                    ),
                });
            }
            datagram.payload
        }),
        _ => return None,
    };

    match result {
        Ok(payload) => Some(payload),
        Err(e) => {
            // Ports lead both headers; keep them when the rest is unusable
            if let [a, b, c, d, ..] = *data {
                record.transport = transport_layer(
                    protocol,
                    u16::from_be_bytes([a, b]),
                    u16::from_be_bytes([c, d]),
                );
            }
            record.warn(parse_warning(Layer::Transport, e));
            None
        }
    }
}

fn transport_layer(protocol: IpProtocol, src_port: u16, dst_port: u16) -> Option<TransportLayer> {
    match protocol {
        IpProtocol::TCP => Some(TransportLayer::Tcp { src_port, dst_port }),
        IpProtocol::UDP => Some(TransportLayer::Udp { src_port, dst_port }),
        _ => None,
    }
}
