//! HCI-style packet framing for the legacy DFU bootloader.
//!
//! Every request travels as one SLIP-delimited frame:
//!
//! ```text
//! +------+----------------------+---------------+--------+------+
//! | 0xC0 |     Header (4B)      |    Payload    | CRC16  | 0xC0 |
//! +------+----------------------+---------------+--------+------+
//!        | seq/flags, type+len, |  opcode (LE)  |  LE,   |
//!        | len hi, checksum     |  + arguments  | esc'd  |
//! +------+----------------------+---------------+--------+------+
//! ```
//!
//! The header length field is 12 bits, the sequence number 3 bits,
//! and byte 3 is a two's-complement checksum of bytes 0..2. Header,
//! payload and CRC are SLIP-escaped together; the delimiters are not.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Error, Result};
use crate::protocol::crc::{CRC_INIT, crc16};
use crate::protocol::slip;

/// Packet type tag carried in the header for all DFU traffic.
pub const HCI_PACKET_TYPE: u8 = 14;

/// Maximum un-escaped frame size (header + payload + CRC), bounded by
/// the 12-bit header length field.
pub const MAX_FRAME_LEN: usize = 4095;

/// Header size in bytes, independent of payload length.
pub const HEADER_LEN: usize = 4;

/// DFU mode selector for application-image updates.
pub const DFU_MODE_APP: u32 = 4;

/// DFU request opcodes (first 4 payload bytes, little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// Init packet carrying the `.dat` init data.
    InitPacket = 1,
    /// Start packet announcing image sizes.
    StartDfu = 3,
    /// Firmware data chunk.
    DataPacket = 4,
    /// End of data transfer.
    StopData = 5,
    /// Erase one flash page.
    ErasePage = 6,
}

/// Mod-8 frame sequence counter.
///
/// Owned by the session rather than process-global; incremented once
/// per frame built, reset only at timeout/bad-ACK fault points.
#[derive(Debug, Default)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Create a counter starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance mod 8 and return the new value.
    pub fn advance(&mut self) -> u8 {
        self.0 = (self.0 + 1) % 8;
        self.0
    }

    /// Reset to 0.
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Current value.
    pub fn get(&self) -> u8 {
        self.0
    }
}

/// Pack the 4-byte packet header.
///
/// The bit layout must be reproduced exactly for bootloader
/// compatibility; byte 3 makes the four bytes sum to 0 mod 256.
#[allow(clippy::cast_possible_truncation)]
pub fn pack_header(
    seq: u8,
    data_integrity: bool,
    reliable: bool,
    packet_type: u8,
    payload_len: usize,
) -> [u8; 4] {
    let b0 = (seq & 0x07)
        | ((((seq & 0x07) + 1) % 8) << 3)
        | (u8::from(data_integrity) << 6)
        | (u8::from(reliable) << 7);
    let b1 = packet_type | (((payload_len & 0x000F) as u8) << 4);
    let b2 = ((payload_len & 0x0FF0) >> 4) as u8;
    let b3 = (b0.wrapping_add(b1).wrapping_add(b2)).wrapping_neg();
    [b0, b1, b2, b3]
}

/// Extract the acknowledged sequence number from a SLIP-decoded ACK
/// frame.
pub fn ack_sequence(decoded: &[u8]) -> Result<u8> {
    if decoded.len() < 2 {
        return Err(Error::Protocol("incomplete ACK frame".into()));
    }
    Ok((decoded[0] >> 3) & 0x07)
}

/// One framed DFU request, ready for the wire.
#[derive(Debug)]
pub struct HciPacket {
    data: Vec<u8>,
}

impl HciPacket {
    /// Frame an arbitrary payload, consuming one sequence number.
    pub fn new(seq: &mut SequenceNumber, payload: &[u8]) -> Result<Self> {
        let unescaped_len = HEADER_LEN + payload.len() + 2;
        if unescaped_len > MAX_FRAME_LEN {
            return Err(Error::InvalidInput(format!(
                "payload of {} bytes exceeds the 12-bit frame length field",
                payload.len()
            )));
        }

        let header = pack_header(seq.advance(), true, true, HCI_PACKET_TYPE, payload.len());

        let mut frame = Vec::with_capacity(unescaped_len);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);
        let crc = crc16(&frame, CRC_INIT);
        frame.push((crc & 0xFF) as u8);
        frame.push((crc >> 8) as u8);

        let escaped = slip::escape(&frame);
        let mut data = Vec::with_capacity(escaped.len() + 2);
        data.push(slip::END);
        data.extend_from_slice(&escaped);
        data.push(slip::END);

        Ok(Self { data })
    }

    /// Build a Start frame announcing the image sizes.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn start_dfu(
        seq: &mut SequenceNumber,
        mode: u32,
        softdevice_size: u32,
        bootloader_size: u32,
        app_size: u32,
    ) -> Result<Self> {
        let mut payload = Vec::with_capacity(20);
        payload.write_u32::<LittleEndian>(Opcode::StartDfu as u32).unwrap();
        payload.write_u32::<LittleEndian>(mode).unwrap();
        payload.write_u32::<LittleEndian>(softdevice_size).unwrap();
        payload.write_u32::<LittleEndian>(bootloader_size).unwrap();
        payload.write_u32::<LittleEndian>(app_size).unwrap();
        Self::new(seq, &payload)
    }

    /// Build an Init frame carrying the init data, padded with two
    /// zero bytes.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn init_packet(seq: &mut SequenceNumber, init_data: &[u8]) -> Result<Self> {
        let mut payload = Vec::with_capacity(4 + init_data.len() + 2);
        payload.write_u32::<LittleEndian>(Opcode::InitPacket as u32).unwrap();
        payload.extend_from_slice(init_data);
        payload.write_u16::<LittleEndian>(0x0000).unwrap();
        Self::new(seq, &payload)
    }

    /// Build a Data frame for one firmware chunk.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn data_packet(seq: &mut SequenceNumber, chunk: &[u8]) -> Result<Self> {
        let mut payload = Vec::with_capacity(4 + chunk.len());
        payload.write_u32::<LittleEndian>(Opcode::DataPacket as u32).unwrap();
        payload.extend_from_slice(chunk);
        Self::new(seq, &payload)
    }

    /// Build a Stop frame (opcode only).
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn stop_data(seq: &mut SequenceNumber) -> Result<Self> {
        let mut payload = Vec::with_capacity(4);
        payload.write_u32::<LittleEndian>(Opcode::StopData as u32).unwrap();
        Self::new(seq, &payload)
    }

    /// Build an ErasePage frame for one page address.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn erase_page(seq: &mut SequenceNumber, page_address: u32) -> Result<Self> {
        let mut payload = Vec::with_capacity(8);
        payload.write_u32::<LittleEndian>(Opcode::ErasePage as u32).unwrap();
        payload.write_u32::<LittleEndian>(page_address).unwrap();
        Self::new(seq, &payload)
    }

    /// Framed bytes including delimiters.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Length on the wire including delimiters and escaping.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame is empty (never true for built packets).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_checksum_sums_to_zero() {
        for seq in 0..8 {
            for &len in &[0usize, 1, 0x0F, 0x10, 0xFF, 0x100, 0xFFF] {
                for &(dip, rp) in &[(false, false), (true, false), (false, true), (true, true)] {
                    let h = pack_header(seq, dip, rp, HCI_PACKET_TYPE, len);
                    let sum = h.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
                    assert_eq!(sum, 0, "header {h:?} checksum");
                }
            }
        }
    }

    #[test]
    fn test_header_field_layout() {
        let h = pack_header(2, true, true, HCI_PACKET_TYPE, 0x234);
        assert_eq!(h[0] & 0x07, 2);
        assert_eq!((h[0] >> 3) & 0x07, 3);
        assert_eq!(h[0] & 0xC0, 0xC0);
        assert_eq!(h[1] & 0x0F, HCI_PACKET_TYPE);
        assert_eq!((h[1] >> 4) & 0x0F, 0x4);
        assert_eq!(h[2], 0x23);
    }

    #[test]
    fn test_header_accepts_unmasked_sequence() {
        // Only the low three bits matter; u8::MAX must not overflow
        // the next-expected field.
        let h = pack_header(u8::MAX, true, true, HCI_PACKET_TYPE, 0);
        assert_eq!(h, pack_header(7, true, true, HCI_PACKET_TYPE, 0));
        assert_eq!(h[0] & 0x07, 7);
        assert_eq!((h[0] >> 3) & 0x07, 0);
    }

    #[test]
    fn test_sequence_advances_before_first_frame() {
        let mut seq = SequenceNumber::new();
        let pkt = HciPacket::stop_data(&mut seq).unwrap();
        assert_eq!(seq.get(), 1);
        // b0 low bits carry the sequence; frame starts after the delimiter
        assert_eq!(pkt.as_bytes()[1] & 0x07, 1);
    }

    #[test]
    fn test_sequence_wraps_mod_8() {
        let mut seq = SequenceNumber::new();
        for expected in [1, 2, 3, 4, 5, 6, 7, 0, 1] {
            assert_eq!(seq.advance(), expected);
        }
        seq.reset();
        assert_eq!(seq.get(), 0);
    }

    #[test]
    fn test_frame_is_delimited_and_crc_checks() {
        let mut seq = SequenceNumber::new();
        let pkt = HciPacket::data_packet(&mut seq, &[0xC0, 0xDB, 0x01]).unwrap();
        let bytes = pkt.as_bytes();
        assert_eq!(bytes[0], slip::END);
        assert_eq!(bytes[bytes.len() - 1], slip::END);
        // No unescaped specials between the delimiters
        assert!(!bytes[1..bytes.len() - 1].contains(&slip::END));

        let decoded = slip::unescape(bytes).unwrap();
        let (body, crc_bytes) = decoded.split_at(decoded.len() - 2);
        let crc = crc16(body, crate::protocol::crc::CRC_INIT);
        assert_eq!(crc_bytes, [(crc & 0xFF) as u8, (crc >> 8) as u8]);
        // Header length field covers payload only
        let len = usize::from(body[1] >> 4) | (usize::from(body[2]) << 4);
        assert_eq!(len, body.len() - HEADER_LEN);
    }

    #[test]
    fn test_start_frame_payload_layout() {
        let mut seq = SequenceNumber::new();
        let pkt = HciPacket::start_dfu(&mut seq, DFU_MODE_APP, 0, 0, 0x1234).unwrap();
        let decoded = slip::unescape(pkt.as_bytes()).unwrap();
        let payload = &decoded[HEADER_LEN..decoded.len() - 2];
        assert_eq!(&payload[0..4], &3u32.to_le_bytes());
        assert_eq!(&payload[4..8], &DFU_MODE_APP.to_le_bytes());
        assert_eq!(&payload[16..20], &0x1234u32.to_le_bytes());
    }

    #[test]
    fn test_init_packet_zero_padded() {
        let mut seq = SequenceNumber::new();
        let pkt = HciPacket::init_packet(&mut seq, &[0xAA, 0xBB]).unwrap();
        let decoded = slip::unescape(pkt.as_bytes()).unwrap();
        let payload = &decoded[HEADER_LEN..decoded.len() - 2];
        assert_eq!(payload, &[0x01, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0x00, 0x00]);
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let mut seq = SequenceNumber::new();
        let huge = vec![0u8; MAX_FRAME_LEN];
        let err = HciPacket::new(&mut seq, &huge).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(_)));
    }

    #[test]
    fn test_ack_sequence_extraction() {
        // b0 = seq | ((seq+1) << 3): device reports ack in bits 3..5
        assert_eq!(ack_sequence(&[0x28, 0x00]).unwrap(), 5);
        assert_eq!(ack_sequence(&[0x00, 0x00]).unwrap(), 0);
    }

    #[test]
    fn test_ack_sequence_requires_two_bytes() {
        assert!(matches!(
            ack_sequence(&[0x28]),
            Err(crate::Error::Protocol(_))
        ));
    }
}
