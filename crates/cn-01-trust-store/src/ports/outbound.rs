//! # Driven Ports (Outbound SPI)
//!
//! Persistence for the trust store. The host decides where the data lives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A name paired with a PEM-encoded key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedKey {
    pub name: String,
    pub key: String,
}

/// Persisted form of a [`TrustStore`](crate::TrustStore).
///
/// Keys are PEM: public keys for peers and groups, PKCS#8 private keys for
/// the local identity and for group memberships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub peer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub trusted_peers: Vec<NamedKey>,
    #[serde(default)]
    pub trusted_groups: Vec<NamedKey>,
    #[serde(default)]
    pub group_memberships: Vec<NamedKey>,
}

/// Load/save interface for trust configuration.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the runtime may save from a
/// different task than the one that loaded.
pub trait TrustConfigStore: Send + Sync {
    /// Load the stored configuration. A store with nothing saved yet returns
    /// `TrustConfig::default()`.
    fn load(&self) -> Result<TrustConfig, ConfigStoreError>;

    /// Replace the stored configuration.
    fn save(&self, config: &TrustConfig) -> Result<(), ConfigStoreError>;
}

/// Errors from configuration persistence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigStoreError {
    /// File I/O error.
    #[error("I/O error on {path}: {error}")]
    Io {
        /// Path of the file involved.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// Stored data could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration could not be serialized.
    #[error("Serialize error: {0}")]
    Serialize(String),
}
