//! # Identity & Trust Store
//!
//! Holds everything a node knows about whom it trusts:
//!
//! - the local peer name and Ed25519 keypair
//! - individually trusted peers (name + public key, optionally bound to a
//!   connected [`PeerId`](shared_types::PeerId))
//! - trusted groups (name + group public key)
//! - group memberships (name + group private key held locally)
//!
//! ## Architecture
//!
//! - **Domain Layer:** [`TrustStore`], pure data and lookups, no I/O
//! - **Ports Layer:** [`TrustConfigStore`] for loading/saving [`TrustConfig`]
//! - **Adapters Layer:** in-memory store, TOML file store (`toml-store`)
//!
//! ## Example
//!
//! ```rust
//! use cn_01_trust_store::{TrustStore, TrustChange};
//! use shared_crypto::PrivateKey;
//! use shared_types::PeerId;
//!
//! let mut store = TrustStore::new("alice", PrivateKey::generate());
//! let bob = PrivateKey::generate().public_key();
//!
//! assert_eq!(store.add_trusted_peer("bob", bob), TrustChange::Added);
//! store.bind_peer(&bob, PeerId(7));
//! assert_eq!(store.connected_trusted_peers(), vec![PeerId(7)]);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::InMemoryTrustConfigStore;
#[cfg(feature = "toml-store")]
pub use adapters::TomlTrustConfigStore;
pub use domain::{
    GroupMembership, LoadReport, TrustChange, TrustStore, TrustStoreError, TrustedGroup,
    TrustedPeer,
};
pub use ports::{ConfigStoreError, NamedKey, TrustConfig, TrustConfigStore};
