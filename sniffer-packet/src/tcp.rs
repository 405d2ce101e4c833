//! TCP header parsing

use crate::error::ParseError;

/// Borrowed view of a TCP segment
#[derive(Debug, Clone, Copy)]
pub struct TcpSegment<'a> {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Sequence number
    pub sequence_number: u32,
    /// Acknowledgment number
    pub acknowledgment_number: u32,
    /// Data offset in 32-bit words
    pub data_offset: u8,
    /// Raw flag bits (FIN = 0x01 ... CWR = 0x80)
    pub flags: u8,
    /// Window size
    pub window_size: u16,
    /// Bytes following the header and options
    pub payload: &'a [u8],
}

impl<'a> TcpSegment<'a> {
    /// Minimum TCP header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Parse a TCP segment from bytes
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(ParseError::truncated("TCP", Self::MIN_HEADER_SIZE, data.len()));
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let sequence_number = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let acknowledgment_number = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let data_offset = data[12] >> 4;
        let flags = data[13];
        let window_size = u16::from_be_bytes([data[14], data[15]]);

        let header_len = (data_offset as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(ParseError::malformed(
                "TCP",
                format!("data offset {} below minimum", data_offset),
            ));
        }
        if data.len() < header_len {
            return Err(ParseError::truncated("TCP", header_len, data.len()));
        }

        Ok(TcpSegment {
            source_port,
            destination_port,
            sequence_number,
            acknowledgment_number,
            data_offset,
            flags,
            window_size,
            payload: &data[header_len..],
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }

    pub fn is_syn(&self) -> bool {
        self.flags & 0x02 != 0
    }
}
