//! # Trust Store Domain
//!
//! Entities and the in-memory store. No network or file I/O.

mod entities;
mod errors;
mod store;

pub use entities::{GroupMembership, TrustedGroup, TrustedPeer};
pub use errors::TrustStoreError;
pub use store::{LoadReport, TrustChange, TrustStore};

#[cfg(test)]
mod tests;
