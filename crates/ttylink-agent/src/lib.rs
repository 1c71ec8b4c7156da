//! ttylink-agent: Device-side agent for ttylink
//!
//! The agent keeps one outbound WebSocket connection to the relay server
//! and multiplexes interactive login shells over it, one pseudo-terminal
//! per server-assigned session id.

pub mod agent;
pub mod link;
pub mod pty;
pub mod registry;

pub use agent::run;
