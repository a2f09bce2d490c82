//! # Shared Crypto - Node and Group Identities
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Node identity, group membership proofs |
//! | `hashing` | SHA-256 | Key fingerprints, group service ids |
//!
//! ## Encodings
//!
//! Public keys travel on the wire as DER `SubjectPublicKeyInfo` and are
//! stored in configuration as PEM. Private keys are stored as PKCS#8 PEM.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{fingerprint, GroupServiceId};
pub use signatures::{PrivateKey, PublicKey};
