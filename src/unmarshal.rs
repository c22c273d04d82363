//! Payload projections.
//!
//! Total functions from a received packet to a typed payload value. Each
//! returns `Option`: a shape mismatch is a value, not a panic, so the
//! correlation layer can turn it into a protocol error with context.

use crate::protocol::{Acl, Op, Packet};

/// Split a payload on NUL separators, dropping one trailing empty
/// segment so NUL-terminated and bare forms split identically.
pub(crate) fn nul_fields(payload: &[u8]) -> Vec<&[u8]> {
    let mut fields: Vec<&[u8]> = payload.split(|b| *b == b'\0').collect();
    if fields.last() == Some(&&b""[..]) {
        fields.pop();
    }
    fields
}

/// The single string carried by `READ` and `GET_DOMAIN_PATH` replies.
pub fn string(packet: &Packet) -> Option<String> {
    match packet.op() {
        Op::Read | Op::GetDomainPath => {
            String::from_utf8(packet.data().to_vec()).ok()
        }
        _ => None,
    }
}

/// A NUL-separated string list (directory entries, debug output).
pub fn list(packet: &Packet) -> Option<Vec<String>> {
    nul_fields(packet.payload())
        .into_iter()
        .map(|f| String::from_utf8(f.to_vec()).ok())
        .collect()
}

/// An access-control list (`GET_PERMS` replies).
pub fn acl(packet: &Packet) -> Option<Acl> {
    Acl::parse(packet.data())
}

/// A decimal integer payload.
pub fn int(packet: &Packet) -> Option<u64> {
    decimal(packet.data())
}

/// A decimal 32-bit integer payload (`TRANSACTION_START` replies).
pub fn int32(packet: &Packet) -> Option<u32> {
    decimal(packet.data())
}

/// An empty acknowledgement: `OK` or nothing at all.
pub fn unit(packet: &Packet) -> Option<()> {
    if packet.op() == Op::Error {
        return None;
    }
    match packet.data() {
        b"" | b"OK" => Some(()),
        _ => None,
    }
}

/// Success iff the reply is not an error; the payload is not inspected.
pub fn ok(packet: &Packet) -> Option<()> {
    if packet.op() == Op::Error {
        None
    } else {
        Some(())
    }
}

/// The `T`/`F` boolean of `IS_INTRODUCED` replies.
pub fn bool(packet: &Packet) -> Option<bool> {
    match packet.data() {
        b"T" => Some(true),
        b"F" => Some(false),
        _ => None,
    }
}

/// Decimal ASCII, no sign, no surrounding noise.
fn decimal<T: std::str::FromStr>(data: &[u8]) -> Option<T> {
    if data.is_empty() || !data.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(data).ok()?.parse().ok()
}
