//! Trust store entities.

use shared_crypto::{GroupServiceId, PrivateKey, PublicKey};
use shared_types::PeerId;

/// A peer trusted by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedPeer {
    pub name: String,
    pub public_key: PublicKey,
    /// Set while a peer holding this key is connected.
    pub peer: Option<PeerId>,
}

/// A group whose signed membership proofs we accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedGroup {
    pub name: String,
    pub public_key: PublicKey,
    pub service_id: GroupServiceId,
}

impl TrustedGroup {
    pub fn new(name: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            service_id: GroupServiceId::for_group(&public_key),
            public_key,
        }
    }
}

/// A group this node belongs to. Holding the group private key is what
/// lets us prove membership to others.
#[derive(Debug, Clone)]
pub struct GroupMembership {
    pub name: String,
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl GroupMembership {
    pub fn new(name: impl Into<String>, private_key: PrivateKey) -> Self {
        Self {
            name: name.into(),
            public_key: private_key.public_key(),
            private_key,
        }
    }
}
