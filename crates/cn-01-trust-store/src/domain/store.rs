use std::collections::{BTreeMap, HashMap};

use shared_crypto::{CryptoError, GroupServiceId, PrivateKey, PublicKey};
use shared_types::PeerId;
use tracing::{info, warn};

use super::entities::{GroupMembership, TrustedGroup, TrustedPeer};
use super::errors::TrustStoreError;
use crate::ports::{NamedKey, TrustConfig};

/// Result of adding a trusted peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustChange {
    /// The key was not trusted before.
    Added,
    /// The key was already trusted; only its name changed.
    Renamed,
}

/// What happened while loading a [`TrustConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries dropped because their key did not decode.
    pub skipped_entries: usize,
    /// The stored private key was missing or invalid and a new one was made.
    /// The caller should persist the store again.
    pub regenerated_identity: bool,
}

/// Local identity plus trust relationships.
///
/// Trusted peers are keyed by public key. The `PeerId` binding is kept in
/// both directions so that a disconnect only needs the id.
#[derive(Debug)]
pub struct TrustStore {
    peer_name: String,
    private_key: PrivateKey,
    public_key: PublicKey,
    peers: BTreeMap<PublicKey, TrustedPeer>,
    bound: HashMap<PeerId, PublicKey>,
    groups: BTreeMap<PublicKey, TrustedGroup>,
    memberships: BTreeMap<PublicKey, GroupMembership>,
}

impl TrustStore {
    pub fn new(peer_name: impl Into<String>, private_key: PrivateKey) -> Self {
        Self {
            peer_name: peer_name.into(),
            public_key: private_key.public_key(),
            private_key,
            peers: BTreeMap::new(),
            bound: HashMap::new(),
            groups: BTreeMap::new(),
            memberships: BTreeMap::new(),
        }
    }

    // =========================================================================
    // LOCAL IDENTITY
    // =========================================================================

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn set_peer_name(&mut self, peer_name: impl Into<String>) {
        self.peer_name = peer_name.into();
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Replace the local keypair. Returns the previous public key.
    pub fn set_private_key(&mut self, private_key: PrivateKey) -> PublicKey {
        let previous = self.public_key;
        self.public_key = private_key.public_key();
        self.private_key = private_key;
        info!(old = ?previous, new = ?self.public_key, "Local identity replaced");
        previous
    }

    // =========================================================================
    // TRUSTED PEERS
    // =========================================================================

    /// Trust `public_key` under `name`. An existing entry is renamed.
    pub fn add_trusted_peer(&mut self, name: impl Into<String>, public_key: PublicKey) -> TrustChange {
        let name = name.into();
        if let Some(existing) = self.peers.get_mut(&public_key) {
            existing.name = name;
            return TrustChange::Renamed;
        }
        info!(%name, key = ?public_key, "Trusted peer added");
        self.peers.insert(
            public_key,
            TrustedPeer {
                name,
                public_key,
                peer: None,
            },
        );
        TrustChange::Added
    }

    /// Stop trusting `public_key`. The removed entry still carries its
    /// `PeerId` binding so the caller can purge state for that peer.
    pub fn remove_trusted_peer(&mut self, public_key: &PublicKey) -> Option<TrustedPeer> {
        let removed = self.peers.remove(public_key)?;
        if let Some(peer) = removed.peer {
            self.bound.remove(&peer);
        }
        info!(name = %removed.name, "Trusted peer removed");
        Some(removed)
    }

    pub fn trusted_peer(&self, public_key: &PublicKey) -> Option<&TrustedPeer> {
        self.peers.get(public_key)
    }

    pub fn is_trusted_peer(&self, public_key: &PublicKey) -> bool {
        self.peers.contains_key(public_key)
    }

    pub fn trusted_peers(&self) -> impl Iterator<Item = &TrustedPeer> {
        self.peers.values()
    }

    /// Record that `peer` is connected with `public_key`.
    ///
    /// Returns `false` (and records nothing) if the key is not trusted.
    pub fn bind_peer(&mut self, public_key: &PublicKey, peer: PeerId) -> bool {
        match self.peers.get_mut(public_key) {
            Some(trusted) => {
                trusted.peer = Some(peer);
                self.bound.insert(peer, *public_key);
                true
            }
            None => false,
        }
    }

    /// Clear the binding for a disconnected peer.
    pub fn unbind_peer(&mut self, peer: PeerId) -> Option<PublicKey> {
        let key = self.bound.remove(&peer)?;
        if let Some(trusted) = self.peers.get_mut(&key) {
            trusted.peer = None;
        }
        Some(key)
    }

    /// Connected peers holding a trusted key, in key order.
    pub fn connected_trusted_peers(&self) -> Vec<PeerId> {
        self.peers.values().filter_map(|p| p.peer).collect()
    }

    // =========================================================================
    // TRUSTED GROUPS
    // =========================================================================

    /// Trust a group key. Returns the service id to join when the group is
    /// new, `None` when an existing entry was only renamed.
    pub fn add_trusted_group(
        &mut self,
        name: impl Into<String>,
        public_key: PublicKey,
    ) -> Option<GroupServiceId> {
        let name = name.into();
        if let Some(existing) = self.groups.get_mut(&public_key) {
            existing.name = name;
            return None;
        }
        let group = TrustedGroup::new(name, public_key);
        let service_id = group.service_id;
        info!(name = %group.name, %service_id, "Trusted group added");
        self.groups.insert(public_key, group);
        Some(service_id)
    }

    /// Stop trusting a group. Returns the service id to leave.
    pub fn remove_trusted_group(&mut self, public_key: &PublicKey) -> Option<GroupServiceId> {
        let removed = self.groups.remove(public_key)?;
        info!(name = %removed.name, "Trusted group removed");
        Some(removed.service_id)
    }

    pub fn trusted_group(&self, public_key: &PublicKey) -> Option<&TrustedGroup> {
        self.groups.get(public_key)
    }

    pub fn trusted_groups(&self) -> impl Iterator<Item = &TrustedGroup> {
        self.groups.values()
    }

    pub fn has_trusted_groups(&self) -> bool {
        !self.groups.is_empty()
    }

    // =========================================================================
    // GROUP MEMBERSHIPS
    // =========================================================================

    /// Hold the private key of a group. Returns `false` if already a member
    /// (the name is updated).
    pub fn add_group_membership(&mut self, name: impl Into<String>, private_key: PrivateKey) -> bool {
        let membership = GroupMembership::new(name, private_key);
        match self.memberships.get_mut(&membership.public_key) {
            Some(existing) => {
                existing.name = membership.name;
                false
            }
            None => {
                info!(name = %membership.name, "Group membership added");
                self.memberships.insert(membership.public_key, membership);
                true
            }
        }
    }

    pub fn remove_group_membership(&mut self, group_key: &PublicKey) -> Option<GroupMembership> {
        self.memberships.remove(group_key)
    }

    pub fn membership_for(&self, group_key: &PublicKey) -> Option<&GroupMembership> {
        self.memberships.get(group_key)
    }

    pub fn memberships(&self) -> impl Iterator<Item = &GroupMembership> {
        self.memberships.values()
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Build a store from persisted configuration.
    ///
    /// Entries whose keys do not decode are skipped. A missing or invalid
    /// private key is replaced by a fresh one.
    pub fn from_config(config: &TrustConfig) -> (Self, LoadReport) {
        let mut report = LoadReport::default();

        let private_key = match config.private_key.as_deref().map(PrivateKey::from_pem) {
            Some(Ok(key)) => key,
            Some(Err(e)) => {
                warn!(error = %e, "Stored private key is invalid, generating a new identity");
                report.regenerated_identity = true;
                PrivateKey::generate()
            }
            None => {
                info!("No stored private key, generating a new identity");
                report.regenerated_identity = true;
                PrivateKey::generate()
            }
        };
        let mut store = Self::new(config.peer_name.clone(), private_key);

        for entry in &config.trusted_peers {
            match PublicKey::from_pem(&entry.key) {
                Ok(key) => {
                    store.add_trusted_peer(entry.name.clone(), key);
                }
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Skipping trusted peer with invalid key");
                    report.skipped_entries += 1;
                }
            }
        }
        for entry in &config.trusted_groups {
            match PublicKey::from_pem(&entry.key) {
                Ok(key) => {
                    store.add_trusted_group(entry.name.clone(), key);
                }
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Skipping trusted group with invalid key");
                    report.skipped_entries += 1;
                }
            }
        }
        for entry in &config.group_memberships {
            match PrivateKey::from_pem(&entry.key) {
                Ok(key) => {
                    store.add_group_membership(entry.name.clone(), key);
                }
                Err(e) => {
                    warn!(name = %entry.name, error = %e, "Skipping group membership with invalid key");
                    report.skipped_entries += 1;
                }
            }
        }

        (store, report)
    }

    /// Snapshot the store for persistence.
    pub fn to_config(&self) -> Result<TrustConfig, TrustStoreError> {
        let private_key = self
            .private_key
            .to_pem()
            .map_err(|source| TrustStoreError::KeyEncoding {
                name: self.peer_name.clone(),
                source,
            })?;
        let trusted_peers = self
            .peers
            .values()
            .map(|p| named_key(&p.name, p.public_key.to_pem()))
            .collect::<Result<Vec<_>, _>>()?;
        let trusted_groups = self
            .groups
            .values()
            .map(|g| named_key(&g.name, g.public_key.to_pem()))
            .collect::<Result<Vec<_>, _>>()?;
        let group_memberships = self
            .memberships
            .values()
            .map(|m| named_key(&m.name, m.private_key.to_pem()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TrustConfig {
            peer_name: self.peer_name.clone(),
            private_key: Some(private_key),
            trusted_peers,
            trusted_groups,
            group_memberships,
        })
    }
}

fn named_key(name: &str, encoded: Result<String, CryptoError>) -> Result<NamedKey, TrustStoreError> {
    match encoded {
        Ok(key) => Ok(NamedKey {
            name: name.to_string(),
            key,
        }),
        Err(source) => Err(TrustStoreError::KeyEncoding {
            name: name.to_string(),
            source,
        }),
    }
}
