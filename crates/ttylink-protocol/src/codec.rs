//! Text codec for control messages
//!
//! One WebSocket text frame carries one JSON control message, so there is
//! no framing state: encode and decode are plain functions.

use crate::error::ProtocolError;
use crate::message::Message;

/// Encode a message as a JSON text frame
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a text frame into a message.
///
/// Returns `Ok(None)` for a well-formed JSON object with no string `type`
/// field: such records are ignored rather than treated as errors. Anything
/// else that fails to parse is a decode error and the frame is dropped by
/// the caller.
pub fn decode(text: &str) -> Result<Option<Message>, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    match value.get("type") {
        Some(t) if t.is_string() => {}
        _ => return Ok(None),
    }

    Ok(Some(serde_json::from_value(value)?))
}
