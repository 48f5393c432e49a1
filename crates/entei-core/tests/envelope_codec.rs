//! Phoenix envelope and transcript payload tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::{json, Map, Value};

use entei_core::protocol::phoenix::{self, RefCounter};
use entei_core::protocol::transcript::{SegmentId, TranscriptEvent};

fn obj(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn object_and_array_forms_decode_the_same() {
    let a = phoenix::decode(
        r#"{"join_ref":"1","ref":"1","topic":"transcription:live","event":"phx_reply","payload":{"status":"ok","response":{}}}"#,
    )
    .unwrap();
    let b = phoenix::decode(
        r#"["1","1","transcription:live","phx_reply",{"status":"ok","response":{}}]"#,
    )
    .unwrap();
    assert_eq!(a, b);
    assert!(a.is_join_reply());
    assert!(!a.is_heartbeat_reply());
    assert_eq!(a.reply_status(), Some("ok"));
    assert_eq!(a.reply_response(), Some(&json!({})));
}

#[test]
fn heartbeat_reply_is_not_a_join_reply() {
    let env = phoenix::decode(
        r#"{"join_ref":null,"ref":"7","topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}}}"#,
    )
    .unwrap();
    assert!(env.is_heartbeat_reply());
    assert!(!env.is_join_reply());
    assert_eq!(env.join_ref, None);
    assert_eq!(env.msg_ref.as_deref(), Some("7"));
}

#[test]
fn numeric_refs_and_null_payload_are_accepted() {
    let env = phoenix::decode(r#"[null, 4, "room:1", "new_msg", null]"#).unwrap();
    assert_eq!(env.join_ref, None);
    assert_eq!(env.msg_ref.as_deref(), Some("4"));
    assert!(env.payload.is_empty());
    assert_eq!(env.reply_status(), None);
}

#[test]
fn malformed_envelopes_are_rejected() {
    let cases = [
        "not json",
        "42",
        r#"["1","1","topic","event"]"#,
        r#"["1","1","topic","event",{},"extra"]"#,
        r#"{"ref":"1","event":"e","payload":{}}"#,
        r#"{"ref":"1","topic":"t","event":"","payload":{}}"#,
        r#"{"ref":"1","topic":"t","event":"e","payload":[1,2]}"#,
        r#"{"ref":{},"topic":"t","event":"e","payload":{}}"#,
        r#"{"ref":"1","topic":5,"event":"e","payload":{}}"#,
    ];
    for text in cases {
        let err = phoenix::decode(text).expect_err(text);
        assert_eq!(err.code().as_str(), "MALFORMED_ENVELOPE", "input={text}");
    }
}

#[test]
fn encoders_emit_canonical_object_form() {
    assert_eq!(
        phoenix::encode_heartbeat("3").unwrap(),
        r#"{"join_ref":null,"ref":"3","topic":"phoenix","event":"heartbeat","payload":{}}"#
    );
    assert_eq!(
        phoenix::encode_leave("9", "transcription:live").unwrap(),
        r#"{"join_ref":null,"ref":"9","topic":"transcription:live","event":"phx_leave","payload":{}}"#
    );
    assert_eq!(
        phoenix::encode_join("2", "2", "transcription:live", Some(obj(json!({"lang": "en"}))))
            .unwrap(),
        r#"{"join_ref":"2","ref":"2","topic":"transcription:live","event":"phx_join","payload":{"lang":"en"}}"#
    );
    assert_eq!(
        phoenix::encode_join("1", "1", "t", None).unwrap(),
        r#"{"join_ref":"1","ref":"1","topic":"t","event":"phx_join","payload":{}}"#
    );
}

#[test]
fn encoded_join_decodes_back() {
    let text = phoenix::encode_join("5", "5", "transcription:live", None).unwrap();
    let env = phoenix::decode(&text).unwrap();
    assert_eq!(env.event, phoenix::EVENT_JOIN);
    assert_eq!(env.join_ref.as_deref(), Some("5"));
    assert_eq!(env.topic, "transcription:live");
}

#[test]
fn ref_counter_is_monotonic_from_one() {
    let mut refs = RefCounter::new();
    let got: Vec<String> = (0..4).map(|_| refs.next_ref()).collect();
    assert_eq!(got, ["1", "2", "3", "4"]);
}

#[test]
fn transcript_shapes_are_classified() {
    let seg = TranscriptEvent::from_payload(&obj(json!({
        "id": 3, "text": "hello", "is_revision": true, "is_final": false
    })))
    .unwrap();
    assert_eq!(
        seg,
        TranscriptEvent::Segment {
            id: SegmentId(3.0),
            text: "hello".into(),
            is_final: false,
            is_revision: true,
        }
    );

    let string_id = TranscriptEvent::from_payload(&obj(json!({"id": "4.5", "text": "x"}))).unwrap();
    assert!(matches!(string_id, TranscriptEvent::Segment { id, .. } if id == SegmentId(4.5)));

    let typed = TranscriptEvent::from_payload(&obj(json!({
        "type": "audio:transcription", "text": "hi"
    })))
    .unwrap();
    assert!(typed.is_final());
    assert!(typed.is_transcription());

    let other = TranscriptEvent::from_payload(&obj(json!({"type": "audio:level", "text": ""}))).unwrap();
    assert!(!other.is_transcription());

    let plain = TranscriptEvent::from_payload(&obj(json!({"text": "p", "is_final": false}))).unwrap();
    assert_eq!(plain, TranscriptEvent::Plain { text: "p".into(), is_final: false });
}

#[test]
fn payload_without_text_is_not_a_transcript() {
    assert!(TranscriptEvent::from_payload(&obj(json!({"id": 1}))).is_none());
    assert!(TranscriptEvent::from_payload(&obj(json!({"text": 12}))).is_none());
}

#[test]
fn segment_ids_order_numerically() {
    let mut ids = vec![SegmentId(10.0), SegmentId(2.0), SegmentId(2.5)];
    ids.sort();
    assert_eq!(ids, vec![SegmentId(2.0), SegmentId(2.5), SegmentId(10.0)]);
}
