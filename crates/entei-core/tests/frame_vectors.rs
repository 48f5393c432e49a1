//! WebSocket frame decoder vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use entei_core::protocol::frame::{
    encode_frame, parse_frame, FrameDecoder, Inbound, OP_PONG, OP_TEXT, PONG_FRAME,
};

mod vector_loader;
use vector_loader::TestVector;

const LIMIT: usize = 1024;

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

fn drain(dec: &mut FrameDecoder) -> entei_core::Result<Vec<Inbound>> {
    let mut out = Vec::new();
    while let Some(msg) = dec.next_message()? {
        out.push(msg);
    }
    Ok(out)
}

fn check(msg: &Inbound, ex: &serde_json::Value, desc: &str) {
    match (ex["kind"].as_str().unwrap(), msg) {
        ("text", Inbound::Text(t)) => {
            if let Some(want) = ex.get("text") {
                assert_eq!(t, want.as_str().unwrap(), "vector={desc}");
            }
            if let Some(len) = ex.get("len") {
                assert_eq!(t.len() as u64, len.as_u64().unwrap(), "vector={desc}");
            }
        }
        ("binary", Inbound::Binary(b)) | ("ping", Inbound::Ping(b)) => {
            assert_eq!(b.len() as u64, ex["len"].as_u64().unwrap(), "vector={desc}");
        }
        ("close", Inbound::Close) => {}
        (kind, other) => panic!("vector={desc}: expected {kind}, got {other:?}"),
    }
}

#[test]
fn frame_vectors() {
    let files = [
        "text_single.json",
        "text_fragmented.json",
        "fragment_with_ping.json",
        "masked_text.json",
        "text_len16.json",
        "text_len64.json",
        "truncated.json",
        "oversize.json",
        "unknown_opcode.json",
        "binary_then_close.json",
        "invalid_utf8.json",
    ];

    for f in files {
        let v = load(f);
        let mut dec = FrameDecoder::new(LIMIT);
        dec.feed(&v.frame.decode());
        let res = drain(&mut dec);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let msgs = res.expect("expected ok decode");
        let ex = v.expect.expect("missing expect block");
        let want = ex["messages"].as_array().unwrap();

        assert_eq!(msgs.len(), want.len(), "vector={}", v.description);
        for (msg, w) in msgs.iter().zip(want) {
            check(msg, w, &v.description);
        }
        assert_eq!(dec.buffered() as u64, ex["buffered"].as_u64().unwrap(), "vector={}", v.description);
    }
}

#[test]
fn byte_at_a_time_yields_each_message_once() {
    let raw = hex::decode("010368656c890080026c6f810568656c6c6f").unwrap();
    let mut dec = FrameDecoder::new(LIMIT);
    let mut got = Vec::new();
    for b in raw {
        dec.feed(&[b]);
        got.extend(drain(&mut dec).unwrap());
    }
    assert_eq!(
        got,
        vec![
            Inbound::Ping(Default::default()),
            Inbound::Text("hello".into()),
            Inbound::Text("hello".into()),
        ]
    );
    assert_eq!(dec.buffered(), 0);
}

#[test]
fn reassembled_message_over_limit_is_an_error() {
    let chunk = vec![b'a'; 600];
    let mut dec = FrameDecoder::new(LIMIT);
    let mut first = encode_frame(OP_TEXT, &chunk, None).to_vec();
    first[0] &= 0x7F; // clear FIN
    let rest = encode_frame(0x0, &chunk, None).to_vec();
    dec.feed(&first);
    dec.feed(&rest);

    let err = drain(&mut dec).expect_err("expected size error");
    assert_eq!(err.code().as_str(), "MALFORMED_FRAME");
}

#[test]
fn client_frames_are_masked_and_parse_back() {
    let text = "x".repeat(300);
    let wire = entei_core::protocol::frame::encode_text(&text);
    assert_eq!(wire[0], 0x81);
    assert_eq!(wire[1] & 0x80, 0x80, "mask bit must be set");
    assert_eq!(wire[1] & 0x7F, 126);

    let (frame, used) = parse_frame(&wire, LIMIT).unwrap().unwrap();
    assert_eq!(used, wire.len());
    assert!(frame.fin);
    assert_eq!(frame.payload.as_ref(), text.as_bytes());
}

#[test]
fn pong_reply_is_two_unmasked_bytes() {
    assert_eq!(PONG_FRAME, [0x8A, 0x00]);
    assert_eq!(encode_frame(OP_PONG, &[], None).as_ref(), &PONG_FRAME);
}

#[test]
fn close_frame_is_masked_and_empty() {
    let wire = entei_core::protocol::frame::encode_close();
    assert_eq!(wire.len(), 6);
    assert_eq!(wire[0], 0x88);
    assert_eq!(wire[1], 0x80);
}

#[test]
fn reset_discards_partial_message() {
    let mut dec = FrameDecoder::new(LIMIT);
    dec.feed(&hex::decode("010368656c").unwrap());
    assert!(dec.next_message().unwrap().is_none());
    dec.reset();
    dec.feed(&hex::decode("80026c6f81026f6b").unwrap());
    assert_eq!(drain(&mut dec).unwrap(), vec![Inbound::Text("ok".into())]);
}
