//! Envelope codec tests
//!
//! Covers both inbound wire shapes, the failure modes that must be discarded
//! rather than crash the channel, and the outbound client messages.

use k8slab::models::ResourceStatus;
use k8slab::transport::codec::{self, ClientMessage, DecodeError, DecodedMessage};

fn status_update(id: &str, status: ResourceStatus) -> DecodedMessage {
    DecodedMessage::StatusUpdate {
        cluster_id: id.to_string(),
        status,
    }
}

#[test]
fn test_envelope_status_update() {
    let msg = codec::decode(
        r#"{"type": "cluster_status_update", "payload": {"cluster_id": "c1", "status": "RUNNING"}}"#,
    )
    .unwrap();
    assert_eq!(msg, status_update("c1", ResourceStatus::Running));
}

#[test]
fn test_legacy_bare_status() {
    let msg = codec::decode(r#"{"cluster_id": "c7", "status": "PROVISIONING"}"#).unwrap();
    assert_eq!(msg, status_update("c7", ResourceStatus::Provisioning));
}

#[test]
fn test_deleted_status_becomes_deletion() {
    for raw in [
        r#"{"cluster_id": "c1", "status": "DELETED"}"#,
        r#"{"cluster_id": "c1", "status": "Deleted"}"#,
        r#"{"type": "cluster_status_update", "payload": {"cluster_id": "c1", "status": "deleted"}}"#,
    ] {
        assert_eq!(
            codec::decode(raw).unwrap(),
            DecodedMessage::Deleted {
                cluster_id: "c1".to_string()
            },
            "frame: {}",
            raw
        );
    }
}

#[test]
fn test_unlisted_status_is_kept_verbatim() {
    let msg = codec::decode(r#"{"cluster_id": "c1", "status": "HIBERNATING"}"#).unwrap();
    match msg {
        DecodedMessage::StatusUpdate { status, .. } => assert_eq!(status.as_str(), "HIBERNATING"),
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_terminal_envelopes() {
    assert_eq!(
        codec::decode(r#"{"type": "terminal_data", "payload": "$ ls\r\n"}"#).unwrap(),
        DecodedMessage::TerminalData("$ ls\r\n".to_string())
    );
    assert_eq!(
        codec::decode(r#"{"type": "terminal_error", "payload": "pod not ready"}"#).unwrap(),
        DecodedMessage::TerminalError("pod not ready".to_string())
    );
}

#[test]
fn test_terminal_messages_are_flagged() {
    assert!(DecodedMessage::TerminalData(String::new()).is_terminal());
    assert!(DecodedMessage::TerminalError(String::new()).is_terminal());
    assert!(!DecodedMessage::Heartbeat.is_terminal());
    assert!(!status_update("c1", ResourceStatus::Running).is_terminal());
}

#[test]
fn test_heartbeats() {
    assert_eq!(codec::decode(": ping").unwrap(), DecodedMessage::Heartbeat);
    assert_eq!(codec::decode("").unwrap(), DecodedMessage::Heartbeat);
    assert_eq!(codec::decode("  \n").unwrap(), DecodedMessage::Heartbeat);
}

#[test]
fn test_malformed_json_is_an_error() {
    assert!(matches!(
        codec::decode("{not json"),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn test_unknown_type_is_reported() {
    match codec::decode(r#"{"type": "cluster_created", "payload": {}}"#) {
        Err(DecodeError::UnknownType(kind)) => assert_eq!(kind, "cluster_created"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_unsupported_shapes() {
    assert!(matches!(
        codec::decode("[1, 2, 3]"),
        Err(DecodeError::UnsupportedShape)
    ));
    assert!(matches!(
        codec::decode(r#"{"cluster_id": "c1"}"#),
        Err(DecodeError::UnsupportedShape)
    ));
}

#[test]
fn test_status_payload_without_id_is_invalid() {
    assert!(matches!(
        codec::decode(r#"{"type": "cluster_status_update", "payload": {"status": "RUNNING"}}"#),
        Err(DecodeError::InvalidPayload { .. })
    ));
}

#[test]
fn test_binary_frames() {
    let raw = br#"{"cluster_id": 9, "status": "ERROR"}"#;
    assert_eq!(
        codec::decode_binary(raw).unwrap(),
        status_update("9", ResourceStatus::Error)
    );
    assert!(matches!(
        codec::decode_binary(&[0xff, 0xfe]),
        Err(DecodeError::Malformed(_))
    ));
}

#[test]
fn test_encode_is_valid_json() {
    let frame = codec::encode(&ClientMessage::TerminalData {
        payload: "echo \"hi\"\n".to_string(),
    })
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "terminal_data");
    assert_eq!(value["payload"], "echo \"hi\"\n");
}
