use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::checksum::internet_checksum;

/// Header flags
pub mod flags {
    pub const DATA: u8 = 0x01;
    pub const ACK: u8 = 0x10;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SrHeader {
    /// Sequence number of a data packet, or the number being acknowledged
    pub seq_num: u32,
    pub flags: u8,
    /// Nominal frame length in bits, carried for trace output only
    pub frame_len: u32,
    /// Covers `seq_num`, `flags` and the payload. The channel corrupts a
    /// packet by inverting this field.
    pub checksum: u16,
}

impl SrHeader {
    pub fn is_data(&self) -> bool {
        self.flags & flags::DATA != 0
    }
    pub fn is_ack(&self) -> bool {
        self.flags & flags::ACK != 0
    }
}

/// A data packet or an ACK. Immutable once built; the payload is shared, so
/// keeping a copy for retransmission does not copy the bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub header: SrHeader,
    pub payload: Bytes,
}

impl Packet {
    pub fn data(seq: u32, payload: Bytes, frame_len: u32) -> Self {
        Self::sealed(seq, flags::DATA, payload, frame_len)
    }

    /// Create a pure ACK packet for `seq`
    pub fn ack(seq: u32, frame_len: u32) -> Self {
        Self::sealed(seq, flags::ACK, Bytes::new(), frame_len)
    }

    fn sealed(seq: u32, flags: u8, payload: Bytes, frame_len: u32) -> Self {
        let mut header = SrHeader {
            seq_num: seq,
            flags,
            frame_len,
            checksum: 0,
        };
        header.checksum = Self::compute_checksum(&header, &payload);
        Self { header, payload }
    }

    fn compute_checksum(header: &SrHeader, payload: &[u8]) -> u16 {
        internet_checksum(&[
            &header.seq_num.to_be_bytes(),
            &[header.flags, 0],
            payload,
        ])
    }

    pub fn seq(&self) -> u32 {
        self.header.seq_num
    }

    pub fn is_corrupted(&self) -> bool {
        Self::compute_checksum(&self.header, &self.payload) != self.header.checksum
    }

    /// Damage the packet in transit so that [`Packet::is_corrupted`] holds.
    pub fn corrupt(&mut self) {
        self.header.checksum = !self.header.checksum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_packets_are_intact() {
        let data = Packet::data(3, Bytes::from_static(b"abc"), 10);
        assert!(data.header.is_data());
        assert!(!data.header.is_ack());
        assert!(!data.is_corrupted());

        let ack = Packet::ack(3, 10);
        assert!(ack.header.is_ack());
        assert!(ack.payload.is_empty());
        assert!(!ack.is_corrupted());
    }

    #[test]
    fn corrupt_is_detected() {
        let mut packet = Packet::data(7, Bytes::from_static(b"payload"), 10);
        packet.corrupt();
        assert!(packet.is_corrupted());
    }

    #[test]
    fn tampered_sequence_number_is_detected() {
        let mut packet = Packet::data(1, Bytes::from_static(b"x"), 10);
        packet.header.seq_num = 2;
        assert!(packet.is_corrupted());
    }
}
