//! ttylink-protocol: Control protocol for ttylink session multiplexing
//!
//! This crate defines the JSON control messages exchanged between the
//! device agent and the relay server over a WebSocket text channel.

pub mod codec;
pub mod encoding;
pub mod error;
pub mod message;
pub mod session;

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use message::Message;
pub use session::SessionId;
