//! Message types for the ttylink control protocol
//!
//! One JSON object per logical message, discriminated by a `type` field.
//! Terminal payloads are carried base64-encoded (see `encoding`).
//!
//! # Message Flow
//!
//! 1. Agent connects to `ws://<host>:<port>/ws/device?did=<id>`
//! 2. Server acknowledges registration with `add` (an `err` field means
//!    the registration was rejected and is not retryable)
//! 3. Agent sends `ping` on a fixed interval, server answers `pong`
//! 4. Server opens a shell with `login`, closes it with `logout`
//! 5. Terminal I/O flows as `data` messages in both directions
//! 6. When the shell exits on its own the agent sends `logout`

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::encoding::base64_bytes;
use crate::session::SessionId;

/// Control protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Open a new terminal session (server -> device)
    Login {
        /// Identifier for the new session
        sid: SessionId,
    },

    /// Close a terminal session (either direction)
    Logout {
        /// Identifier of the session to close
        sid: SessionId,
    },

    /// Terminal bytes for one session (either direction)
    Data {
        /// Session the bytes belong to
        sid: SessionId,
        /// Raw terminal bytes, base64 on the wire
        #[serde(with = "base64_bytes")]
        data: Bytes,
    },

    /// Liveness probe (device -> server)
    Ping,

    /// Liveness response (server -> device)
    Pong,

    /// Device registration acknowledgement (server -> device)
    Add {
        /// Present only when registration failed; rejection is fatal
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err: Option<String>,
    },
}

impl Message {
    /// Build a `data` message for a session's terminal output
    pub fn data(sid: SessionId, bytes: impl Into<Bytes>) -> Self {
        Message::Data {
            sid,
            data: bytes.into(),
        }
    }

    /// Build a `logout` notification for a session
    pub fn logout(sid: SessionId) -> Self {
        Message::Logout { sid }
    }
}
