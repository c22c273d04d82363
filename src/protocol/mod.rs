//! Protocol module - wire format, framing, and packet types.
//!
//! This module implements the binary core of the protocol:
//! - operation codes and their u32 mapping
//! - 16-byte header encoding/decoding
//! - the packet type with typed accessors
//! - an incremental parser for unaligned byte streams
//! - access-control lists and watch tokens

mod acl;
mod ids;
mod op;
mod packet;
mod parser;
mod token;
mod wire_format;

pub use acl::{Acl, Perm};
pub use ids::fresh_id;
pub use op::{Op, ALL_OPS};
pub use packet::Packet;
pub use parser::{Parse, Parser};
pub use token::Token;
pub use wire_format::{errno, Header, HEADER_SIZE, PAYLOAD_MAX};
