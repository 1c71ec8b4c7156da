//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding control messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message is not a JSON object
    #[error("Message is not a JSON object")]
    NotAnObject,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
