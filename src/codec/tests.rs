use super::*;
use crate::event::{DeltaAction, Domain, Tag};
use chrono::TimeZone;
use serde_json::json;

#[test]
fn test_decode_live_update() {
    let text = json!({
        "type": "liveUpdate",
        "payload": {
            "type": "fire",
            "action": "update",
            "data": { "id": "f1", "status": "contained" },
            "timestamp": "2024-02-11T13:00:00Z"
        }
    })
    .to_string();

    match decode(&text).unwrap() {
        InboundFrame::LiveUpdate(delta) => {
            assert_eq!(delta.domain, Tag::Known(Domain::Fire));
            assert_eq!(delta.action, Tag::Known(DeltaAction::Update));
            assert_eq!(delta.data.id, "f1");
        }
        other => panic!("Expected LiveUpdate, got {:?}", other),
    }
}

#[test]
fn test_decode_heartbeat_timestamp_locations() {
    let top = decode(r#"{"type":"heartbeat","timestamp":1707668400000}"#).unwrap();
    assert_eq!(
        top,
        InboundFrame::HeartbeatAck {
            timestamp: Some(1707668400000)
        }
    );

    let nested = decode(r#"{"type":"heartbeat","payload":{"timestamp":42}}"#).unwrap();
    assert_eq!(nested, InboundFrame::HeartbeatAck { timestamp: Some(42) });

    let bare = decode(r#"{"type":"heartbeat"}"#).unwrap();
    assert_eq!(bare, InboundFrame::HeartbeatAck { timestamp: None });
}

#[test]
fn test_decode_error_frame() {
    let frame = decode(r#"{"type":"error","payload":{"message":"rate limited"}}"#).unwrap();
    assert_eq!(
        frame,
        InboundFrame::Error {
            message: "rate limited".to_string()
        }
    );

    let loose = decode(r#"{"type":"error","payload":"boom"}"#).unwrap();
    assert_eq!(
        loose,
        InboundFrame::Error {
            message: "boom".to_string()
        }
    );
}

#[test]
fn test_unknown_frame_type_is_not_an_error() {
    let frame = decode(r#"{"type":"surprise","data":{"hello":1}}"#).unwrap();
    assert_eq!(
        frame,
        InboundFrame::Unknown {
            frame_type: "surprise".to_string()
        }
    );
}

#[test]
fn test_server_notices() {
    let greeting = decode(
        r#"{"type":"connection","data":{"message":"Connected"},"success":true,"timestamp":1707668400000}"#,
    )
    .unwrap();
    assert_eq!(
        greeting,
        InboundFrame::Notice {
            frame_type: "connection".to_string()
        }
    );

    let echo = decode(r#"{"type":"echo","data":{"type":"heartbeat"},"success":true}"#).unwrap();
    assert_eq!(
        echo,
        InboundFrame::Notice {
            frame_type: "echo".to_string()
        }
    );
}

fn weather_create_at(timestamp: serde_json::Value) -> String {
    json!({
        "type": "liveUpdate",
        "payload": {
            "type": "weather",
            "action": "create",
            "data": { "id": "w1" },
            "timestamp": timestamp
        }
    })
    .to_string()
}

fn decoded_timestamp(text: &str) -> Option<DateTime<Utc>> {
    match decode(text).unwrap() {
        InboundFrame::LiveUpdate(delta) => delta.emitted_at,
        other => panic!("Expected LiveUpdate, got {:?}", other),
    }
}

#[test]
fn test_live_update_timestamp_shapes() {
    let expected = Utc.with_ymd_and_hms(2024, 2, 11, 13, 0, 0).unwrap();

    let offset_less = weather_create_at(json!("2024-02-11T13:00:00"));
    assert_eq!(decoded_timestamp(&offset_less), Some(expected));

    let epoch_ms = weather_create_at(json!(expected.timestamp_millis()));
    assert_eq!(decoded_timestamp(&epoch_ms), Some(expected));

    let with_offset = weather_create_at(json!("2024-02-11T15:00:00+02:00"));
    assert_eq!(decoded_timestamp(&with_offset), Some(expected));
}

#[test]
fn test_unreadable_timestamp_keeps_delta() {
    assert_eq!(decoded_timestamp(&weather_create_at(json!("yesterday"))), None);
    assert_eq!(decoded_timestamp(&weather_create_at(json!({ "at": 1 }))), None);
    assert_eq!(decoded_timestamp(&weather_create_at(serde_json::Value::Null)), None);
}

#[test]
fn test_malformed_frames() {
    assert!(matches!(decode("not json at all"), Err(DecodeError::Malformed(_))));
    assert!(matches!(decode(r#"{"payload":{}}"#), Err(DecodeError::Malformed(_))));
    assert!(matches!(decode("[1,2,3]"), Err(DecodeError::Malformed(_))));
}

#[test]
fn test_live_update_with_bad_payload() {
    let err = decode(r#"{"type":"liveUpdate","payload":{"type":"fire"}}"#).unwrap_err();
    match err {
        DecodeError::InvalidPayload { frame_type, .. } => assert_eq!(frame_type, "liveUpdate"),
        other => panic!("Expected InvalidPayload, got {:?}", other),
    }
}

#[test]
fn test_encode_heartbeat() {
    let at = Utc.timestamp_millis_opt(1_707_668_400_000).unwrap();
    let text = encode_heartbeat(at);
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value, json!({ "type": "heartbeat", "timestamp": 1_707_668_400_000i64 }));
}
