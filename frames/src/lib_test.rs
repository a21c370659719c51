use super::*;

#[test]
fn frame_type_names_match_wire() {
    assert_eq!(FrameType::ConnectionEstablished.as_str(), "connection_established");
    assert_eq!(FrameType::IssueCreated.as_str(), "issue_created");
    assert_eq!(FrameType::IssueUpdated.as_str(), "issue_updated");
    assert_eq!(FrameType::IssueDeleted.as_str(), "issue_deleted");
    assert_eq!(FrameType::Pong.as_str(), "pong");
    assert_eq!(FrameType::Error.as_str(), "error");
}

#[test]
fn frame_type_parse_is_inverse_of_as_str() {
    for kind in FrameType::ALL {
        assert_eq!(FrameType::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(FrameType::parse("user_logged_in"), None);
    assert_eq!(FrameType::parse("ISSUE_CREATED"), None);
}

#[test]
fn only_issue_frames_are_issue_events() {
    let events: Vec<_> = FrameType::ALL.into_iter().filter(|k| k.is_issue_event()).collect();
    assert_eq!(events.len(), 3);
    assert!(!FrameType::Pong.is_issue_event());
    assert!(!FrameType::ConnectionEstablished.is_issue_event());
}

#[test]
fn decode_issue_update_keeps_payload() {
    let frame = decode_frame(
        r#"{"type":"issue_updated","data":{"id":42,"status":"OPEN"},"timestamp":1712.5}"#,
    )
    .expect("decode should succeed");

    assert_eq!(frame.kind, "issue_updated");
    assert_eq!(frame.frame_type(), Some(FrameType::IssueUpdated));
    assert_eq!(frame.data, Some(serde_json::json!({"id": 42, "status": "OPEN"})));
    assert_eq!(frame.timestamp, Some(1712.5));
    assert!(frame.message.is_none());
}

#[test]
fn decode_welcome_ignores_unknown_fields() {
    let frame = decode_frame(
        r#"{"type":"connection_established","message":"Connected to real-time updates","connection_id":"1234"}"#,
    )
    .expect("decode should succeed");

    assert_eq!(frame.frame_type(), Some(FrameType::ConnectionEstablished));
    assert_eq!(frame.message.as_deref(), Some("Connected to real-time updates"));
    assert!(frame.data.is_none());
}

#[test]
fn decode_bare_pong() {
    let frame = decode_frame(r#"{"type":"pong"}"#).expect("decode should succeed");
    assert_eq!(frame.frame_type(), Some(FrameType::Pong));
    assert!(frame.timestamp.is_none());
}

#[test]
fn decode_unknown_type_is_not_an_error() {
    let frame = decode_frame(r#"{"type":"user_logged_in","data":{}}"#).expect("decode");
    assert_eq!(frame.kind, "user_logged_in");
    assert!(frame.frame_type().is_none());
}

#[test]
fn decode_rejects_missing_type() {
    let err = decode_frame(r#"{"data":{}}"#).expect_err("type is required");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_rejects_non_json() {
    let err = decode_frame("not json").expect_err("garbage should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_rejects_non_string_type() {
    assert!(decode_frame(r#"{"type":7}"#).is_err());
    assert!(decode_frame(r#"["pong"]"#).is_err());
}

#[test]
fn ping_encodes_type_and_timestamp() {
    let text = encode_frame(&OutboundFrame::Ping { timestamp: 1_700_000_000_123 }).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value, serde_json::json!({"type": "ping", "timestamp": 1_700_000_000_123_i64}));
}
