//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature format
    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    /// Public key could not be decoded or is not a valid curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Private key could not be decoded
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Key could not be encoded
    #[error("Key encoding failed: {0}")]
    Encoding(String),
}
