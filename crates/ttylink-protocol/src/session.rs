//! Session identifier type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a terminal session, assigned by the server.
///
/// Reference tokens are 32 hex characters, but the identifier is treated
/// as an opaque string: the agent never inspects its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID from an opaque token
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
