//! Incremental packet parser.
//!
//! A small state machine for decoding packets from a byte stream that
//! cannot promise aligned reads: feed it slices of any size (down to one
//! byte at a time) and it reports how many bytes it still wants.
//!
//! States:
//! - `NeedMoreData(n)`: accumulate `n` more bytes (header first, then the
//!   payload once the header's length is known)
//! - `UnknownOperation`: header carried a code outside the operation
//!   table (terminal)
//! - `Failed`: framing violation, e.g. advertised length above the
//!   protocol maximum (terminal)
//! - `Complete`: a whole packet has been decoded (terminal)
//!
//! # Example
//!
//! ```
//! use xenstore_wire::protocol::{Parse, Parser};
//!
//! let mut parser = Parser::new();
//! assert_eq!(parser.pending(), 16);
//!
//! // ty=13 (RM), rid=0, tid=0, len=0
//! let header = [13, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
//! match parser.input(&header) {
//!     Parse::Complete(packet) => assert_eq!(packet.payload_len(), 0),
//!     other => panic!("unexpected state: {:?}", other),
//! }
//! ```

use bytes::BytesMut;

use super::op::Op;
use super::packet::Packet;
use super::wire_format::{Header, HEADER_SIZE, PAYLOAD_MAX};

/// Result of feeding bytes to (or inspecting) a [`Parser`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parse {
    /// `n > 0` more bytes are wanted; pass at most `n` to [`Parser::input`].
    NeedMoreData(usize),
    /// The header carried an operation code outside the table. Terminal.
    UnknownOperation(u32),
    /// Framing violation (advertised length above the maximum). Terminal.
    Failed,
    /// A complete packet. Terminal; extract the packet and discard the
    /// parser.
    Complete(Packet),
}

/// Parsing state machine.
#[derive(Debug)]
enum State {
    /// Accumulating the 16-byte header.
    Header { buf: [u8; HEADER_SIZE], got: usize },
    /// Header parsed, accumulating `header.len` payload bytes.
    Payload { header: Header, op: Op, buf: BytesMut },
    /// Terminal: unknown operation code.
    Unknown(u32),
    /// Terminal: framing violation.
    Failed,
    /// Terminal: complete packet.
    Done(Packet),
}

/// Incremental decoder for one packet.
///
/// Single-owner and single-shot: once a terminal state is reached,
/// further [`input`](Parser::input) is ignored and the terminal state is
/// returned again. Callers should pass at most [`pending`](Parser::pending)
/// bytes per call; longer slices are defensively truncated.
#[derive(Debug)]
pub struct Parser {
    state: State,
}

impl Parser {
    /// Start parsing a fresh packet.
    pub fn new() -> Self {
        Self {
            state: State::Header {
                buf: [0u8; HEADER_SIZE],
                got: 0,
            },
        }
    }

    /// How many bytes the parser wants next; 0 in terminal states.
    pub fn pending(&self) -> usize {
        match &self.state {
            State::Header { got, .. } => HEADER_SIZE - got,
            State::Payload { header, buf, .. } => header.payload_len() - buf.len(),
            State::Unknown(_) | State::Failed | State::Done(_) => 0,
        }
    }

    /// The current state.
    pub fn state(&self) -> Parse {
        match &self.state {
            State::Header { .. } | State::Payload { .. } => Parse::NeedMoreData(self.pending()),
            State::Unknown(ty) => Parse::UnknownOperation(*ty),
            State::Failed => Parse::Failed,
            State::Done(packet) => Parse::Complete(packet.clone()),
        }
    }

    /// Feed bytes to the parser and return the resulting state.
    ///
    /// `bytes` should hold at most [`pending`](Parser::pending) bytes;
    /// any excess is ignored (the caller sized its read wrong, the wire
    /// position would be lost by consuming it here).
    pub fn input(&mut self, bytes: &[u8]) -> Parse {
        let take = bytes.len().min(self.pending());
        let bytes = &bytes[..take];

        match &mut self.state {
            State::Header { buf, got } => {
                buf[*got..*got + bytes.len()].copy_from_slice(bytes);
                *got += bytes.len();
                if *got == HEADER_SIZE {
                    let full = *buf;
                    self.state = Self::on_header(&full);
                }
            }
            State::Payload { header, op, buf } => {
                buf.extend_from_slice(bytes);
                if buf.len() == header.payload_len() {
                    let (tid, rid, op) = (header.tid, header.rid, *op);
                    let payload = buf.split().freeze();
                    self.state = State::Done(Packet::new(tid, rid, op, payload));
                }
            }
            State::Unknown(_) | State::Failed | State::Done(_) => {}
        }

        self.state()
    }

    /// Transition out of the header phase once all 16 bytes are in.
    fn on_header(buf: &[u8; HEADER_SIZE]) -> State {
        let header = match Header::decode(buf) {
            Some(header) => header,
            None => return State::Failed,
        };

        let op = match Op::from_u32(header.ty) {
            Some(op) => op,
            None => return State::Unknown(header.ty),
        };

        if header.payload_len() > PAYLOAD_MAX {
            return State::Failed;
        }

        if header.len == 0 {
            return State::Done(Packet::new(header.tid, header.rid, op, bytes::Bytes::new()));
        }

        State::Payload {
            header,
            op,
            buf: BytesMut::with_capacity(header.payload_len()),
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
