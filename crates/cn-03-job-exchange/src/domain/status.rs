//! Node status exchanged via `QueryNodeStatus` / `NodeStatus`.

use shared_crypto::PublicKey;
use shared_types::PeerId;

/// Load figures a node reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStatus {
    pub max_threads: u16,
    pub current_threads: u16,
    /// Jobs in any local queue stage.
    pub local_jobs: u16,
    /// Jobs shipped to other peers.
    pub delegated_jobs: u16,
    /// Jobs received from other peers.
    pub remote_jobs: u16,
}

/// A group a peer reported membership of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub name: String,
    pub public_key: PublicKey,
}

/// A decoded `NodeStatus` reply, as handed to the event sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerStatusReport {
    pub peer: PeerId,
    pub public_key: PublicKey,
    pub fingerprint: String,
    pub peer_name: String,
    pub status: NodeStatus,
    pub groups: Vec<GroupInfo>,
}

/// Saturate a count into the `u16` wire field.
pub(crate) fn clamp_count(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}
