//! Envelope codec for the live channel
//!
//! Inbound frames are decoded exactly once into a closed set of
//! [`DecodedMessage`] variants. Two wire shapes are accepted:
//!
//! ```text
//! {"type": "cluster_status_update", "payload": {"cluster_id": "c1", "status": "RUNNING"}}
//! {"cluster_id": "c1", "status": "RUNNING"}            // legacy bare status
//! ```
//!
//! Lines starting with `:` are heartbeats. Anything else that does not parse is
//! a [`DecodeError`]; callers log and discard it.

use crate::models::ResourceStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CLUSTER_STATUS_UPDATE: &str = "cluster_status_update";
pub const TERMINAL_DATA: &str = "terminal_data";
pub const TERMINAL_ERROR: &str = "terminal_error";

/// Status value the server uses to announce removal
const DELETED_STATUS: &str = "DELETED";

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    StatusUpdate {
        cluster_id: String,
        status: ResourceStatus,
    },
    Deleted {
        cluster_id: String,
    },
    TerminalData(String),
    TerminalError(String),
    Heartbeat,
}

impl DecodedMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DecodedMessage::TerminalData(_) | DecodedMessage::TerminalError(_)
        )
    }
}

/// Reasons a frame could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unrecognized message type: {0}")]
    UnknownType(String),

    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("frame is neither an envelope nor a bare status object")]
    UnsupportedShape,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(deserialize_with = "id_as_string")]
    cluster_id: String,
    status: String,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string id, got {}",
            other
        ))),
    }
}

/// Decode one text frame
pub fn decode(raw: &str) -> Result<DecodedMessage, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return Ok(DecodedMessage::Heartbeat);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(DecodeError::UnsupportedShape);
    };

    if object.get("type").is_some_and(Value::is_string) {
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        return decode_envelope(envelope);
    }

    // Legacy shape: a bare object carrying `status` directly
    if object.contains_key("status") {
        return decode_status(CLUSTER_STATUS_UPDATE, value);
    }

    Err(DecodeError::UnsupportedShape)
}

/// Decode one binary frame (UTF-8 text carried in a binary message)
pub fn decode_binary(raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    decode(text)
}

fn decode_envelope(envelope: Envelope) -> Result<DecodedMessage, DecodeError> {
    match envelope.kind.as_str() {
        CLUSTER_STATUS_UPDATE => decode_status(CLUSTER_STATUS_UPDATE, envelope.payload),
        TERMINAL_DATA => Ok(DecodedMessage::TerminalData(payload_text(
            TERMINAL_DATA,
            envelope.payload,
        )?)),
        TERMINAL_ERROR => Ok(DecodedMessage::TerminalError(payload_text(
            TERMINAL_ERROR,
            envelope.payload,
        )?)),
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

fn decode_status(kind: &str, payload: Value) -> Result<DecodedMessage, DecodeError> {
    let payload: StatusPayload =
        serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
            kind: kind.to_string(),
            reason: e.to_string(),
        })?;

    if payload.status.eq_ignore_ascii_case(DELETED_STATUS) {
        Ok(DecodedMessage::Deleted {
            cluster_id: payload.cluster_id,
        })
    } else {
        Ok(DecodedMessage::StatusUpdate {
            cluster_id: payload.cluster_id,
            status: ResourceStatus::from(payload.status),
        })
    }
}

fn payload_text(kind: &str, payload: Value) -> Result<String, DecodeError> {
    match payload {
        Value::String(s) => Ok(s),
        Value::Null => Err(DecodeError::InvalidPayload {
            kind: kind.to_string(),
            reason: "missing payload".to_string(),
        }),
        // Non-string payloads are rendered as JSON rather than dropped
        other => Ok(other.to_string()),
    }
}

/// Messages the client sends on the channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartTerminal { cluster_id: String },
    TerminalData { payload: String },
}

/// Encode a client message as a JSON text frame
pub fn encode(message: &ClientMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
