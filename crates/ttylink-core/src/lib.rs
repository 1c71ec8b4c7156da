//! ttylink-core: Configuration and device identity for the ttylink agent
//!
//! Holds everything the runtime needs before a connection exists: the
//! agent configuration (file + defaults), device identity derivation,
//! and the startup environment checks.

pub mod config;
pub mod error;
pub mod identity;
pub mod setup;

pub use config::AgentConfig;
pub use error::{ConfigError, IdentityError, SetupError};
