//! Request construction and parsing.
//!
//! One constructor per operation builds the request packet with a fresh
//! request id. Constructors validate their inputs (non-empty paths, no
//! embedded NUL in string fields, payload within the protocol maximum)
//! and return `None` when the packet cannot be framed; they never panic.
//!
//! [`parse`] is the receiver-side dual: it splits a request packet's
//! payload back into a typed [`Payload`] per the same grammar.
//!
//! Payload grammar per operation (fields separated by NUL; a trailing
//! NUL terminates the payload except for `WRITE`):
//!
//! | op | payload | tid |
//! |---|---|---|
//! | `DIRECTORY` `READ` `GET_PERMS` `MKDIR` `RM` | `path\0` | caller |
//! | `WRITE` | `path\0value` (no trailing NUL) | caller |
//! | `SET_PERMS` | `path\0<acl wire form>` | caller |
//! | `WATCH` `UNWATCH` | `path\0token\0` | 0 |
//! | `TRANSACTION_START` | empty | 0 |
//! | `TRANSACTION_END` | `T\0` or `F\0` | caller |
//! | `INTRODUCE` | `domid\0mfn\0port\0` | 0 |
//! | `RELEASE` `RESUME` `GET_DOMAIN_PATH` `IS_INTRODUCED` `RESTRICT` | `domid\0` | 0 |
//! | `SET_TARGET` | `domid\0target\0` | 0 |
//! | `DEBUG` | `cmd1\0cmd2\0…\0` | 0 |

use bytes::Bytes;

use crate::protocol::{fresh_id, Acl, Op, Packet, Token, PAYLOAD_MAX};
use crate::unmarshal::nul_fields;

/// A parsed request payload, as seen by the receiving end.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Debug(Vec<String>),
    Directory(String),
    Read(String),
    GetPerms(String),
    Watch(String, String),
    Unwatch(String, String),
    TransactionStart,
    TransactionEnd(bool),
    Introduce { domid: u32, mfn: u64, port: u32 },
    Release(u32),
    GetDomainPath(u32),
    Write(String, Bytes),
    Mkdir(String),
    Rm(String),
    SetPerms(String, Acl),
    IsIntroduced(u32),
    Resume(u32),
    SetTarget { domid: u32, target: u32 },
    Restrict(u32),
}

/// List the children of a node.
pub fn directory(tid: u32, path: &str) -> Option<Packet> {
    path_request(tid, Op::Directory, path)
}

/// Read the value of a node.
pub fn read(tid: u32, path: &str) -> Option<Packet> {
    path_request(tid, Op::Read, path)
}

/// Fetch the ACL attached to a node.
pub fn get_perms(tid: u32, path: &str) -> Option<Packet> {
    path_request(tid, Op::GetPerms, path)
}

/// Create a node (and any missing parents).
pub fn mkdir(tid: u32, path: &str) -> Option<Packet> {
    path_request(tid, Op::Mkdir, path)
}

/// Remove a node and its subtree.
pub fn rm(tid: u32, path: &str) -> Option<Packet> {
    path_request(tid, Op::Rm, path)
}

/// Write a value to a node. The value is raw bytes and is not
/// NUL-terminated on the wire.
pub fn write(tid: u32, path: &str, value: &[u8]) -> Option<Packet> {
    if !string_field_ok(path) {
        return None;
    }
    let mut payload = Vec::with_capacity(path.len() + 1 + value.len());
    payload.extend_from_slice(path.as_bytes());
    payload.push(b'\0');
    payload.extend_from_slice(value);
    build(tid, Op::Write, payload)
}

/// Replace the ACL attached to a node.
pub fn set_perms(tid: u32, path: &str, acl: &Acl) -> Option<Packet> {
    if !string_field_ok(path) {
        return None;
    }
    let mut payload = path.as_bytes().to_vec();
    payload.push(b'\0');
    payload.extend_from_slice(&acl.encode());
    build(tid, Op::SetPerms, payload)
}

/// Subscribe to changes under a path.
pub fn watch(path: &str, token: &Token) -> Option<Packet> {
    watch_request(Op::Watch, path, token)
}

/// Cancel a subscription. The token must be byte-identical to the one
/// the watch was registered with.
pub fn unwatch(path: &str, token: &Token) -> Option<Packet> {
    watch_request(Op::Unwatch, path, token)
}

/// Open a transaction; the reply carries the new transaction id.
pub fn transaction_start() -> Option<Packet> {
    build(0, Op::TransactionStart, Vec::new())
}

/// Close a transaction, committing (`true`) or discarding it.
pub fn transaction_end(tid: u32, commit: bool) -> Option<Packet> {
    let payload = if commit { b"T\0" } else { b"F\0" };
    build(tid, Op::TransactionEnd, payload.to_vec())
}

/// Introduce a new domain to the store.
pub fn introduce(domid: u32, mfn: u64, port: u32) -> Option<Packet> {
    build(
        0,
        Op::Introduce,
        format!("{}\0{}\0{}\0", domid, mfn, port).into_bytes(),
    )
}

/// Release a domain's connection.
pub fn release(domid: u32) -> Option<Packet> {
    domid_request(Op::Release, domid)
}

/// Resume a domain's connection after suspend.
pub fn resume(domid: u32) -> Option<Packet> {
    domid_request(Op::Resume, domid)
}

/// Ask for a domain's home path in the store.
pub fn get_domain_path(domid: u32) -> Option<Packet> {
    domid_request(Op::GetDomainPath, domid)
}

/// Ask whether a domain has been introduced.
pub fn is_introduced(domid: u32) -> Option<Packet> {
    domid_request(Op::IsIntroduced, domid)
}

/// Restrict this connection to a domain's privileges.
pub fn restrict(domid: u32) -> Option<Packet> {
    domid_request(Op::Restrict, domid)
}

/// Point a stub domain at its target domain.
pub fn set_target(domid: u32, target: u32) -> Option<Packet> {
    build(
        0,
        Op::SetTarget,
        format!("{}\0{}\0", domid, target).into_bytes(),
    )
}

/// Send debug commands to the store.
pub fn debug(commands: &[&str]) -> Option<Packet> {
    let mut payload = Vec::new();
    for command in commands {
        if command.as_bytes().contains(&b'\0') {
            return None;
        }
        payload.extend_from_slice(command.as_bytes());
        payload.push(b'\0');
    }
    build(0, Op::Debug, payload)
}

/// Split a request packet back into its typed payload.
///
/// Returns `None` for malformed payloads (wrong field count, embedded
/// garbage where a decimal was expected, a bad ACL) and for packet types
/// that are not requests (`WATCH_EVENT`, `ERROR`).
pub fn parse(packet: &Packet) -> Option<Payload> {
    let payload = packet.payload();
    match packet.op() {
        Op::Directory => Some(Payload::Directory(single_path(payload)?)),
        Op::Read => Some(Payload::Read(single_path(payload)?)),
        Op::GetPerms => Some(Payload::GetPerms(single_path(payload)?)),
        Op::Mkdir => Some(Payload::Mkdir(single_path(payload)?)),
        Op::Rm => Some(Payload::Rm(single_path(payload)?)),
        Op::Write => {
            let (path, value) = split_at_nul(payload)?;
            Some(Payload::Write(
                path_field(path)?,
                Bytes::copy_from_slice(value),
            ))
        }
        Op::SetPerms => {
            let (path, rest) = split_at_nul(payload)?;
            Some(Payload::SetPerms(path_field(path)?, Acl::parse(rest)?))
        }
        Op::Watch => {
            let (path, token) = two_fields(payload)?;
            Some(Payload::Watch(path, token))
        }
        Op::Unwatch => {
            let (path, token) = two_fields(payload)?;
            Some(Payload::Unwatch(path, token))
        }
        Op::TransactionStart => {
            if nul_fields(payload).is_empty() {
                Some(Payload::TransactionStart)
            } else {
                None
            }
        }
        Op::TransactionEnd => match nul_fields(payload).as_slice() {
            [flag] => match *flag {
                b"T" => Some(Payload::TransactionEnd(true)),
                b"F" => Some(Payload::TransactionEnd(false)),
                _ => None,
            },
            _ => None,
        },
        Op::Introduce => match nul_fields(payload).as_slice() {
            [domid, mfn, port] => Some(Payload::Introduce {
                domid: decimal(domid)?,
                mfn: decimal(mfn)?,
                port: decimal(port)?,
            }),
            _ => None,
        },
        Op::Release => Some(Payload::Release(single_domid(payload)?)),
        Op::Resume => Some(Payload::Resume(single_domid(payload)?)),
        Op::GetDomainPath => Some(Payload::GetDomainPath(single_domid(payload)?)),
        Op::IsIntroduced => Some(Payload::IsIntroduced(single_domid(payload)?)),
        Op::Restrict => Some(Payload::Restrict(single_domid(payload)?)),
        Op::SetTarget => match nul_fields(payload).as_slice() {
            [domid, target] => Some(Payload::SetTarget {
                domid: decimal(domid)?,
                target: decimal(target)?,
            }),
            _ => None,
        },
        Op::Debug => nul_fields(payload)
            .into_iter()
            .map(|f| String::from_utf8(f.to_vec()).ok())
            .collect::<Option<Vec<_>>>()
            .map(Payload::Debug),
        Op::WatchEvent | Op::Error => None,
    }
}

/// Non-empty and free of the NUL separator.
fn string_field_ok(s: &str) -> bool {
    !s.is_empty() && !s.as_bytes().contains(&b'\0')
}

fn build(tid: u32, op: Op, payload: Vec<u8>) -> Option<Packet> {
    if payload.len() > PAYLOAD_MAX {
        return None;
    }
    Some(Packet::new(tid, fresh_id(), op, payload))
}

fn path_request(tid: u32, op: Op, path: &str) -> Option<Packet> {
    if !string_field_ok(path) {
        return None;
    }
    let mut payload = path.as_bytes().to_vec();
    payload.push(b'\0');
    build(tid, op, payload)
}

fn watch_request(op: Op, path: &str, token: &Token) -> Option<Packet> {
    if !string_field_ok(path) || !string_field_ok(token.as_wire()) {
        return None;
    }
    let mut payload = path.as_bytes().to_vec();
    payload.push(b'\0');
    payload.extend_from_slice(token.as_wire().as_bytes());
    payload.push(b'\0');
    build(0, op, payload)
}

fn domid_request(op: Op, domid: u32) -> Option<Packet> {
    build(0, op, format!("{}\0", domid).into_bytes())
}

fn split_at_nul(payload: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = payload.iter().position(|b| *b == b'\0')?;
    Some((&payload[..idx], &payload[idx + 1..]))
}

fn single_path(payload: &[u8]) -> Option<String> {
    match nul_fields(payload).as_slice() {
        [path] => path_field(path),
        _ => None,
    }
}

fn single_domid(payload: &[u8]) -> Option<u32> {
    match nul_fields(payload).as_slice() {
        [domid] => decimal(domid),
        _ => None,
    }
}

fn two_fields(payload: &[u8]) -> Option<(String, String)> {
    match nul_fields(payload).as_slice() {
        [a, b] => Some((path_field(a)?, String::from_utf8(b.to_vec()).ok()?)),
        _ => None,
    }
}

fn path_field(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    String::from_utf8(bytes.to_vec()).ok()
}

fn decimal<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}
