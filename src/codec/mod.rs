use crate::event::LiveDelta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Server → Client frame, after decoding
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// A typed create/update/delete delta
    LiveUpdate(LiveDelta),
    /// Server heartbeat (acknowledges ours)
    HeartbeatAck { timestamp: Option<i64> },
    /// Server-reported error
    Error { message: String },
    /// Informational frame (`connection` greeting, `echo`); nothing to apply
    Notice { frame_type: String },
    /// Frame type this client does not understand
    Unknown { frame_type: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid '{frame_type}' payload: {source}")]
    InvalidPayload {
        frame_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Outer envelope shared by every frame type.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

/// Client → Server frame
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    Heartbeat { timestamp: i64 },
}

/// Decode a raw text frame.
///
/// Unknown frame types decode to `InboundFrame::Unknown` rather than an
/// error; only unparseable JSON or a bad payload for a known type fails.
pub fn decode(text: &str) -> Result<InboundFrame, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

    match envelope.frame_type.as_str() {
        "liveUpdate" => {
            let delta = serde_json::from_value(envelope.payload).map_err(|source| {
                DecodeError::InvalidPayload {
                    frame_type: envelope.frame_type.clone(),
                    source,
                }
            })?;
            Ok(InboundFrame::LiveUpdate(delta))
        }
        "heartbeat" => {
            // Timestamp may sit on the envelope or inside the payload
            let timestamp = envelope
                .timestamp
                .as_ref()
                .or_else(|| envelope.payload.get("timestamp"))
                .and_then(Value::as_i64);
            Ok(InboundFrame::HeartbeatAck { timestamp })
        }
        "error" => {
            let message = match serde_json::from_value::<ErrorPayload>(envelope.payload.clone()) {
                Ok(p) => p.message,
                Err(_) => match envelope.payload {
                    Value::String(s) => s,
                    Value::Null => "unspecified server error".to_string(),
                    other => other.to_string(),
                },
            };
            Ok(InboundFrame::Error { message })
        }
        "connection" | "echo" => Ok(InboundFrame::Notice {
            frame_type: envelope.frame_type,
        }),
        _ => Ok(InboundFrame::Unknown {
            frame_type: envelope.frame_type,
        }),
    }
}

/// Encode an outbound frame as JSON text.
pub fn encode(frame: &OutboundFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// `{"type":"heartbeat","timestamp":<epoch-ms>}`
pub fn encode_heartbeat(at: DateTime<Utc>) -> String {
    // A tag plus an integer always serializes
    encode(&OutboundFrame::Heartbeat {
        timestamp: at.timestamp_millis(),
    })
    .unwrap_or_else(|_| format!(r#"{{"type":"heartbeat","timestamp":{}}}"#, at.timestamp_millis()))
}
