use crate::error::ConnectionError;
use crate::inject::RawInstruction;
use crate::tracking::ElementDescriptor;
use serde::{Deserialize, Serialize};

/// WebSocket close code for an orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the socket died without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Message pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    ElementClicked(ElementDescriptor),
    InjectInstruction(RawInstruction),
    Unrecognized(String),
}

/// Message sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    ElementClicked {
        data: ElementDescriptor,
        timestamp: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub fn parse_inbound(raw: &str) -> Result<InboundMessage, ConnectionError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| ConnectionError::Protocol(e.to_string()))?;

    match envelope.kind.as_str() {
        "element-clicked" => serde_json::from_value(envelope.data)
            .map(InboundMessage::ElementClicked)
            .map_err(|e| ConnectionError::Protocol(format!("element-clicked: {e}"))),
        "inject-instruction" => serde_json::from_value(envelope.data)
            .map(InboundMessage::InjectInstruction)
            .map_err(|e| ConnectionError::Protocol(format!("inject-instruction: {e}"))),
        _ => Ok(InboundMessage::Unrecognized(envelope.kind)),
    }
}
