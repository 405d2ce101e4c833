//! UDP header parsing

use crate::error::ParseError;

/// Borrowed view of a UDP datagram
#[derive(Debug, Clone, Copy)]
pub struct UdpDatagram<'a> {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Length (header + data) as declared in the header
    pub length: u16,
    /// Checksum
    pub checksum: u16,
    /// Payload, bounded by `length` when the capture holds all of it
    pub payload: &'a [u8],
    /// The capture holds fewer bytes than `length` declares
    pub truncated: bool,
}

impl<'a> UdpDatagram<'a> {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Parse a UDP datagram from bytes
    ///
    /// Does not validate the checksum.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(ParseError::truncated("UDP", Self::HEADER_SIZE, data.len()));
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let length = u16::from_be_bytes([data[4], data[5]]);
        let checksum = u16::from_be_bytes([data[6], data[7]]);

        // Jumbograms and some offloaded captures carry length 0; use what was captured
        let end = match length as usize {
            0 => data.len(),
            len if len < Self::HEADER_SIZE => {
                return Err(ParseError::malformed(
                    "UDP",
                    format!("length {} shorter than header", len),
                ))
            }
            len => len.min(data.len()),
        };

        Ok(UdpDatagram {
            source_port,
            destination_port,
            length,
            checksum,
            payload: &data[Self::HEADER_SIZE..end],
            truncated: length as usize > data.len(),
        })
    }
}
