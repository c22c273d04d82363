//! Property tests: encode/decode laws and parser chunking invariance.

use proptest::prelude::*;

use xenstore_wire::protocol::{Acl, Op, Packet, Parse, Parser, Perm, ALL_OPS, PAYLOAD_MAX};
use xenstore_wire::request;

fn perm_strategy() -> impl Strategy<Value = Perm> {
    prop_oneof![
        Just(Perm::None),
        Just(Perm::Read),
        Just(Perm::Write),
        Just(Perm::ReadWrite),
    ]
}

fn acl_strategy() -> impl Strategy<Value = Acl> {
    (
        any::<u32>(),
        perm_strategy(),
        prop::collection::vec((any::<u32>(), perm_strategy()), 0..8),
    )
        .prop_map(|(owner, other, acl)| Acl { owner, other, acl })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop::sample::select(ALL_OPS.to_vec())
}

/// Feed `bytes` to the parser in chunks picked by `next_chunk`, always
/// respecting the at-most-`pending` contract. Stops early if the parser
/// reaches a terminal state.
fn feed(parser: &mut Parser, bytes: &[u8], mut next_chunk: impl FnMut() -> usize) {
    let mut offset = 0;
    while offset < bytes.len() {
        let pending = parser.pending();
        if pending == 0 {
            break;
        }
        let take = next_chunk()
            .max(1)
            .min(pending)
            .min(bytes.len() - offset);
        parser.input(&bytes[offset..offset + take]);
        offset += take;
    }
}

proptest! {
    #[test]
    fn prop_op_code_mapping_is_partial_inverse(code in any::<u32>()) {
        match Op::from_u32(code) {
            Some(op) => {
                prop_assert!(code <= 20);
                prop_assert_eq!(op.to_u32(), code);
            }
            None => prop_assert!(code > 20),
        }
    }

    #[test]
    fn prop_acl_roundtrip(acl in acl_strategy()) {
        let encoded = acl.encode();
        prop_assert_eq!(Acl::parse(&encoded), Some(acl));
    }

    #[test]
    fn prop_packet_roundtrip_any_chunking(
        op in op_strategy(),
        tid in any::<u32>(),
        rid in any::<u32>(),
        payload in prop::collection::vec(any::<u8>(), 0..512),
        chunks in prop::collection::vec(1usize..64, 1..32),
    ) {
        let packet = Packet::new(tid, rid, op, payload.clone());
        let bytes = packet.to_bytes();

        let mut parser = Parser::new();
        let mut plan = chunks.into_iter().cycle();
        feed(&mut parser, &bytes, move || plan.next().unwrap());

        match parser.state() {
            Parse::Complete(decoded) => {
                prop_assert_eq!(decoded.tid(), tid);
                prop_assert_eq!(decoded.rid(), rid);
                prop_assert_eq!(decoded.op(), op);
                prop_assert_eq!(decoded.payload(), &payload[..]);
            }
            state => prop_assert!(false, "unexpected state: {:?}", state),
        }
    }

    #[test]
    fn prop_chunking_does_not_change_the_outcome(
        bytes in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        // arbitrary byte strings: most are garbage headers, some parse.
        // byte-at-a-time and maximal-slice feeding must agree.
        let mut one_at_a_time = Parser::new();
        feed(&mut one_at_a_time, &bytes, || 1);

        let mut maximal = Parser::new();
        feed(&mut maximal, &bytes, || usize::MAX);

        prop_assert_eq!(one_at_a_time.state(), maximal.state());
    }

    #[test]
    fn prop_oversized_length_always_fails(
        len in (PAYLOAD_MAX as u32 + 1)..,
        code in 0u32..=20,
    ) {
        let mut header = Vec::new();
        header.extend_from_slice(&code.to_le_bytes());
        header.extend_from_slice(&[0; 8]);
        header.extend_from_slice(&len.to_le_bytes());

        let mut parser = Parser::new();
        prop_assert_eq!(parser.input(&header), Parse::Failed);
    }

    #[test]
    fn prop_path_request_parse_roundtrip(
        path in "/[a-zA-Z0-9_/-]{1,40}",
        tid in any::<u32>(),
    ) {
        let packet = request::read(tid, &path).unwrap();
        prop_assert_eq!(packet.tid(), tid);
        prop_assert_eq!(
            request::parse(&packet),
            Some(request::Payload::Read(path))
        );
    }

    #[test]
    fn prop_write_request_parse_roundtrip(
        path in "/[a-zA-Z0-9_/-]{1,40}",
        value in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let packet = request::write(0, &path, &value).unwrap();
        // the value is framed raw: no terminator, interior NULs kept
        prop_assert_eq!(
            request::parse(&packet),
            Some(request::Payload::Write(path, value.into()))
        );
    }
}
