//! Trust store errors.

use shared_crypto::CryptoError;
use thiserror::Error;

/// Errors from trust store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustStoreError {
    /// A key could not be encoded for persistence.
    #[error("Key encoding failed for '{name}': {source}")]
    KeyEncoding {
        /// Entry the key belongs to.
        name: String,
        /// Underlying crypto error.
        source: CryptoError,
    },
}
