//! Core error types for ttylink

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Required setting missing after merging file and flags
    #[error("Missing required setting: {0}")]
    MissingField(&'static str),
}

/// Device identity derivation errors
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Explicit device id is empty
    #[error("Device id must not be empty")]
    Empty,

    /// Explicit device id exceeds the protocol limit
    #[error("Device id is {len} bytes, maximum is {max}")]
    TooLong { len: usize, max: usize },

    /// Network interface could not be read
    #[error("Cannot read hardware address of interface '{name}': {source}")]
    Interface {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Hardware address was not a MAC-48 address
    #[error("Interface '{name}' reported an unusable hardware address '{address}'")]
    BadAddress { name: String, address: String },

    /// Neither an explicit id nor an interface name was supplied
    #[error("No device identity: specify an interface name or an explicit id")]
    Unspecified,
}

/// Startup environment check errors
#[derive(Error, Debug)]
pub enum SetupError {
    /// Agent is not running with the privilege needed to spawn login
    #[error("Operation not permitted: the agent must run as root to spawn login shells")]
    NotPrivileged,

    /// The system login program could not be located
    #[error("The 'login' program was not found on this system")]
    LoginNotFound,
}
