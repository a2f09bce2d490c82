//! # SHA-256 Derived Identifiers
//!
//! - Fingerprints shown to operators when comparing keys out of band.
//! - Group service ids: the overlay channel a group's members join.

use crate::signatures::PublicKey;
use sha2::{Digest, Sha256};
use std::fmt;

/// Overlay service identifier for a trust group.
///
/// Derived from the SHA-256 of the group public key's DER encoding, so every
/// member computes the same id without coordination.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupServiceId([u8; 32]);

impl GroupServiceId {
    /// Derive the service id for a group key.
    pub fn for_group(group_key: &PublicKey) -> Self {
        Self(Sha256::digest(group_key.to_der()).into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for GroupServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupServiceId({})", self)
    }
}

impl fmt::Display for GroupServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Colon-separated SHA-256 fingerprint of a public key's DER encoding.
pub fn fingerprint(key: &PublicKey) -> String {
    let digest = Sha256::digest(key.to_der());
    digest
        .iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrivateKey;

    #[test]
    fn test_service_id_is_stable_per_key() {
        let group = PrivateKey::from_seed([7u8; 32]).public_key();
        assert_eq!(GroupServiceId::for_group(&group), GroupServiceId::for_group(&group));

        let other = PrivateKey::from_seed([8u8; 32]).public_key();
        assert_ne!(GroupServiceId::for_group(&group), GroupServiceId::for_group(&other));
    }

    #[test]
    fn test_fingerprint_format() {
        let key = PrivateKey::from_seed([1u8; 32]).public_key();
        let fp = fingerprint(&key);
        assert_eq!(fp.split(':').count(), 32);
        assert!(fp.split(':').all(|octet| octet.len() == 2));
    }
}
