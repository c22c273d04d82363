//! Wire format encoding and decoding.
//!
//! Implements the 16-byte header format:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │ ty       │ rid      │ tid      │ len      │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │ 4 bytes  │
//! │ u32 LE   │ u32 LE   │ u32 LE   │ u32 LE   │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! All fields are Little Endian. `len` is the payload length in bytes and
//! may not exceed [`PAYLOAD_MAX`].

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_SIZE: usize = 16;

/// Maximum payload size the protocol allows (4 KiB).
pub const PAYLOAD_MAX: usize = 4096;

/// Error names the store reports in `ERROR` payloads.
pub mod errno {
    pub const EINVAL: &str = "EINVAL";
    pub const EACCES: &str = "EACCES";
    pub const EEXIST: &str = "EEXIST";
    pub const EISDIR: &str = "EISDIR";
    pub const ENOENT: &str = "ENOENT";
    pub const ENOMEM: &str = "ENOMEM";
    pub const ENOSPC: &str = "ENOSPC";
    pub const EIO: &str = "EIO";
    pub const ENOTEMPTY: &str = "ENOTEMPTY";
    pub const ENOSYS: &str = "ENOSYS";
    pub const EROFS: &str = "EROFS";
    pub const EBUSY: &str = "EBUSY";
    pub const EAGAIN: &str = "EAGAIN";
}

/// Decoded header from wire format.
///
/// `ty` is kept as the raw wire code here; resolution to an
/// [`Op`](super::Op) happens when a packet is assembled, so that unknown
/// codes can be reported instead of lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Operation wire code.
    pub ty: u32,
    /// Request identifier, echoed in the matching response.
    pub rid: u32,
    /// Transaction identifier (0 = no transaction).
    pub tid: u32,
    /// Payload length in bytes.
    pub len: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(ty: u32, rid: u32, tid: u32, len: u32) -> Self {
        Self { ty, rid, tid, len }
    }

    /// Encode the header to bytes (Little Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than [`HEADER_SIZE`].
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.ty.to_le_bytes());
        buf[4..8].copy_from_slice(&self.rid.to_le_bytes());
        buf[8..12].copy_from_slice(&self.tid.to_le_bytes());
        buf[12..16].copy_from_slice(&self.len.to_le_bytes());
    }

    /// Decode a header from bytes (Little Endian).
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            ty: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            rid: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            tid: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            len: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    /// Advertised payload length as a `usize`.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.len as usize
    }
}
