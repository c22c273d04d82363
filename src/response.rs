//! Response construction.
//!
//! Each builder takes the request packet it answers and copies its `rid`
//! and `tid` so the peer can correlate the reply; the payload is framed
//! per the operation's grammar. Only [`error`] changes the operation
//! type; success replies echo the request's.
//!
//! [`watch_event`] is the exception to the request/response pairing: it
//! builds the unsolicited event packet, which correlates by token rather
//! than request id and therefore always carries `rid == 0`.

use bytes::Bytes;

use crate::protocol::{Acl, Op, Packet};

/// Reply to `READ`: the value, raw, with no trailing NUL.
pub fn read(request: &Packet, value: &[u8]) -> Packet {
    reply(request, Op::Read, Bytes::copy_from_slice(value))
}

/// Reply to `GET_PERMS`: the ACL in wire form.
pub fn get_perms(request: &Packet, acl: &Acl) -> Packet {
    reply(request, Op::GetPerms, acl.encode())
}

/// Reply to `GET_DOMAIN_PATH`: the NUL-terminated path.
pub fn get_domain_path(request: &Packet, path: &str) -> Packet {
    reply(request, Op::GetDomainPath, terminated(path))
}

/// Reply to `TRANSACTION_START`: the newly opened transaction id.
pub fn transaction_start(request: &Packet, tid: u32) -> Packet {
    reply(request, Op::TransactionStart, terminated(&tid.to_string()))
}

/// Reply to `DIRECTORY`: each child name NUL-terminated.
pub fn directory(request: &Packet, names: &[&str]) -> Packet {
    let mut payload = Vec::new();
    for name in names {
        payload.extend_from_slice(name.as_bytes());
        payload.push(b'\0');
    }
    reply(request, Op::Directory, payload)
}

/// Reply to `DEBUG`: one line per NUL-terminated field.
pub fn debug(request: &Packet, lines: &[&str]) -> Packet {
    let mut payload = Vec::new();
    for line in lines {
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\0');
    }
    reply(request, Op::Debug, payload)
}

/// Reply to `IS_INTRODUCED`: `T` or `F`.
pub fn is_introduced(request: &Packet, introduced: bool) -> Packet {
    let payload = if introduced { b"T\0" } else { b"F\0" };
    reply(request, Op::IsIntroduced, payload.to_vec())
}

/// The plain acknowledgement (`OK\0`) shared by every operation whose
/// success carries no data: `WRITE`, `MKDIR`, `RM`, `SET_PERMS`,
/// `WATCH`, `UNWATCH`, `TRANSACTION_END`, `INTRODUCE`, `RELEASE`,
/// `RESUME`, `SET_TARGET`, `RESTRICT`.
pub fn ack(request: &Packet) -> Packet {
    reply(request, request.op(), b"OK\0".to_vec())
}

/// An error reply: the error name (e.g. `ENOENT`), NUL-terminated.
pub fn error(request: &Packet, name: &str) -> Packet {
    reply(request, Op::Error, terminated(name))
}

/// An unsolicited watch event: `path\0token\0`, always `rid == 0` and
/// outside any transaction.
pub fn watch_event(path: &str, token: &str) -> Packet {
    let mut payload = Vec::with_capacity(path.len() + token.len() + 2);
    payload.extend_from_slice(path.as_bytes());
    payload.push(b'\0');
    payload.extend_from_slice(token.as_bytes());
    payload.push(b'\0');
    Packet::new(0, 0, Op::WatchEvent, payload)
}

fn reply(request: &Packet, op: Op, payload: impl Into<Bytes>) -> Packet {
    Packet::new(request.tid(), request.rid(), op, payload)
}

fn terminated(s: &str) -> Vec<u8> {
    let mut payload = s.as_bytes().to_vec();
    payload.push(b'\0');
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request;

    fn sample_request() -> Packet {
        request::read(7, "/foo").unwrap()
    }

    #[test]
    fn test_replies_preserve_rid_and_tid() {
        let req = sample_request();
        let resp = read(&req, b"value");
        assert_eq!(resp.rid(), req.rid());
        assert_eq!(resp.tid(), 7);
    }

    #[test]
    fn test_read_reply_is_raw() {
        let resp = read(&sample_request(), b"value");
        assert_eq!(resp.op(), Op::Read);
        assert_eq!(resp.payload(), b"value");
    }

    #[test]
    fn test_directory_reply_terminates_each_name() {
        let req = request::directory(0, "/").unwrap();
        let resp = directory(&req, &["console", "vm"]);
        assert_eq!(resp.payload(), b"console\0vm\0");
        assert_eq!(directory(&req, &[]).payload(), b"");
    }

    #[test]
    fn test_transaction_start_reply_carries_new_tid() {
        let req = request::transaction_start().unwrap();
        let resp = transaction_start(&req, 42);
        assert_eq!(resp.payload(), b"42\0");
        assert_eq!(resp.tid(), 0);
    }

    #[test]
    fn test_ack_echoes_request_type() {
        let req = request::write(3, "/a", b"v").unwrap();
        let resp = ack(&req);
        assert_eq!(resp.op(), Op::Write);
        assert_eq!(resp.payload(), b"OK\0");
        assert_eq!(resp.tid(), 3);
    }

    #[test]
    fn test_error_reply_switches_type() {
        let req = sample_request();
        let resp = error(&req, "ENOENT");
        assert_eq!(resp.op(), Op::Error);
        assert_eq!(resp.payload(), b"ENOENT\0");
        assert_eq!(resp.rid(), req.rid());
    }

    #[test]
    fn test_is_introduced_flag() {
        let req = request::is_introduced(5).unwrap();
        assert_eq!(is_introduced(&req, true).payload(), b"T\0");
        assert_eq!(is_introduced(&req, false).payload(), b"F\0");
    }

    #[test]
    fn test_watch_event_has_rid_zero() {
        let event = watch_event("/local/domain/5/state", "3:fe");
        assert_eq!(event.rid(), 0);
        assert_eq!(event.tid(), 0);
        assert_eq!(event.op(), Op::WatchEvent);
        assert_eq!(event.payload(), b"/local/domain/5/state\03:fe\0");
    }

    #[test]
    fn test_get_perms_reply_roundtrips() {
        use crate::protocol::Perm;
        let req = request::get_perms(0, "/x").unwrap();
        let acl = Acl {
            owner: 0,
            other: Perm::Read,
            acl: vec![(5, Perm::Write)],
        };
        let resp = get_perms(&req, &acl);
        assert_eq!(crate::unmarshal::acl(&resp), Some(acl));
    }
}
