//! Error types for etcd-dns.

use std::time::Duration;
use thiserror::Error;

/// Top-level errors for the DNS server and heartbeat agents.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry operation failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// HTTP client error (from registry client initialization)
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be loaded.
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Record payload could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors returned by a [`Registry`](crate::registry::Registry).
///
/// Only [`RegistryError::NotFound`] is rendered to DNS clients as a name
/// error; every other variant becomes a server failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key does not exist.
    #[error("key not found: {key}")]
    NotFound {
        /// Requested key.
        key: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("registry call on {key} timed out after {timeout:?}")]
    Timeout {
        /// Key the call was made for.
        key: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// Transport-level failure talking to the registry.
    #[error("registry request for {key} failed: {source}")]
    Http {
        /// Key the call was made for.
        key: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The registry answered with an error other than "key not found".
    #[error("registry error {code} on {key}: {message}")]
    Server {
        /// Key the call was made for.
        key: String,
        /// etcd error code.
        code: u64,
        /// Message from the registry.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("failed to decode value at {key}: {source}")]
    Decode {
        /// Key of the undecodable value.
        key: String,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The registry response did not have the expected shape.
    #[error("malformed registry response for {key}: {reason}")]
    Malformed {
        /// Key the call was made for.
        key: String,
        /// What was wrong.
        reason: String,
    },
}

impl RegistryError {
    /// Whether this error means the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    /// Key the failed call was made for.
    pub fn key(&self) -> &str {
        match self {
            RegistryError::NotFound { key }
            | RegistryError::Timeout { key, .. }
            | RegistryError::Http { key, .. }
            | RegistryError::Server { key, .. }
            | RegistryError::Decode { key, .. }
            | RegistryError::Malformed { key, .. } => key,
        }
    }
}

/// A health check gate did not pass.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The command ran and exited unsuccessfully.
    #[error("check '{command}' exited with {status}: '{output}'")]
    Failed {
        /// Command line.
        command: String,
        /// Exit status description.
        status: String,
        /// Combined stdout and stderr.
        output: String,
    },

    /// The command could not be started.
    #[error("failed to run check '{command}': {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish in time.
    #[error("check '{command}' timed out after {timeout:?}")]
    Timeout {
        /// Command line.
        command: String,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// An in-process predicate rejected the cycle.
    #[error("check failed: {0}")]
    Rejected(String),
}
