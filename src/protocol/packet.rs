//! Packet struct with typed accessors.
//!
//! A packet is the framed unit of the protocol: the four header fields
//! plus a payload blob. Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use xenstore_wire::protocol::{Op, Packet};
//!
//! let packet = Packet::new(0, 42, Op::Read, &b"/local/domain/0\0"[..]);
//! assert_eq!(packet.op(), Op::Read);
//! assert_eq!(packet.data(), b"/local/domain/0");
//! ```

use bytes::Bytes;

use super::op::Op;
use super::wire_format::{Header, HEADER_SIZE, PAYLOAD_MAX};

/// A complete protocol packet.
///
/// The payload length advertised on the wire is always the actual buffer
/// length; a payload above [`PAYLOAD_MAX`] is a programmer error here
/// (request builders enforce the limit, the parser rejects oversized
/// frames from the peer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    tid: u32,
    rid: u32,
    op: Op,
    payload: Bytes,
}

impl Packet {
    /// Create a new packet from header fields and a payload.
    pub fn new(tid: u32, rid: u32, op: Op, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= PAYLOAD_MAX);
        Self {
            tid,
            rid,
            op,
            payload,
        }
    }

    /// Transaction id (0 = no transaction).
    #[inline]
    pub fn tid(&self) -> u32 {
        self.tid
    }

    /// Request id, used to correlate a response with its request.
    #[inline]
    pub fn rid(&self) -> u32 {
        self.rid
    }

    /// The operation.
    #[inline]
    pub fn op(&self) -> Op {
        self.op
    }

    /// The raw payload bytes, exactly as framed.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// A cheap clone of the payload (zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// The payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// The logical payload: the raw bytes with a single trailing NUL
    /// stripped, if present.
    ///
    /// The store NUL-terminates most reply strings; callers want the
    /// string without the terminator. Exactly one trailing NUL is
    /// removed, interior NULs (field separators) are preserved.
    pub fn data(&self) -> &[u8] {
        match self.payload.split_last() {
            Some((0, rest)) => rest,
            _ => &self.payload,
        }
    }

    /// Serialize the packet: 16-byte header followed by the payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = Header::new(
            self.op.to_u32(),
            self.rid,
            self.tid,
            self.payload.len() as u32,
        );
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_accessors() {
        let packet = Packet::new(7, 42, Op::Write, &b"/a\0hi"[..]);
        assert_eq!(packet.tid(), 7);
        assert_eq!(packet.rid(), 42);
        assert_eq!(packet.op(), Op::Write);
        assert_eq!(packet.payload(), b"/a\0hi");
        assert_eq!(packet.payload_len(), 5);
    }

    #[test]
    fn test_data_strips_single_trailing_nul() {
        let packet = Packet::new(0, 1, Op::Read, &b"value\0"[..]);
        assert_eq!(packet.data(), b"value");
    }

    #[test]
    fn test_data_strips_at_most_one_nul() {
        let packet = Packet::new(0, 1, Op::Directory, &b"a\0b\0"[..]);
        assert_eq!(packet.data(), b"a\0b");
    }

    #[test]
    fn test_data_without_trailing_nul_unchanged() {
        let packet = Packet::new(0, 1, Op::Read, &b"value"[..]);
        assert_eq!(packet.data(), b"value");
    }

    #[test]
    fn test_data_empty_payload() {
        let packet = Packet::new(0, 1, Op::TransactionStart, Bytes::new());
        assert_eq!(packet.data(), b"");
    }

    #[test]
    fn test_to_bytes_layout() {
        let packet = Packet::new(3, 2, Op::Directory, &b"/x\0"[..]);
        let bytes = packet.to_bytes();

        assert_eq!(bytes.len(), HEADER_SIZE + 3);
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.ty, Op::Directory.to_u32());
        assert_eq!(header.rid, 2);
        assert_eq!(header.tid, 3);
        assert_eq!(header.len, 3);
        assert_eq!(&bytes[HEADER_SIZE..], b"/x\0");
    }

    #[test]
    fn test_to_bytes_empty_payload() {
        let packet = Packet::new(0, 9, Op::TransactionStart, Bytes::new());
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(Header::decode(&bytes).unwrap().len, 0);
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let original = Bytes::from_static(b"shared");
        let packet = Packet::new(0, 1, Op::Read, original.clone());
        assert_eq!(packet.payload_bytes().as_ptr(), original.as_ptr());
    }
}
