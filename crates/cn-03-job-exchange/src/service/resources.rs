//! Slot advertisement, group-proven slot queries and node status.

use cn_02_slot_market::{FreeCompilerSlots, RecordOutcome};
use shared_crypto::{fingerprint, PublicKey};
use shared_types::PeerId;
use tracing::{debug, info, warn};

use super::core::JobExchangeService;
use crate::domain::{
    select_membership, GroupInfo, JobExchangeError, MembershipProof, PeerStatusReport,
};
use crate::ports::{CompilerExecutor, FileStore, JobEventSink, JobExchangeEvent, Transport};
use crate::wire::{NodeStatusPayload, Packet, Resources};

impl<T, C, F, E> JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    fn local_resources(&self) -> Resources {
        Resources {
            slots: self.free_local_slots,
            toolchains: self.toolchains.iter().map(|t| t.version.clone()).collect(),
        }
    }

    // =========================================================================
    // ASKING
    // =========================================================================

    /// Ask trusted peers directly, and everyone else through our trusted
    /// groups.
    pub(crate) fn ask_for_free_slots(&self) {
        let trusted = self.trust.connected_trusted_peers();
        for peer in &trusted {
            self.send(*peer, &Packet::QueryNetworkResources);
        }

        let group_keys: Vec<Vec<u8>> = self
            .trust
            .trusted_groups()
            .take(self.config.max_group_query_keys)
            .map(|group| group.public_key.to_der())
            .collect();
        let groups = group_keys.len();
        if !group_keys.is_empty() {
            self.broadcast(&Packet::QueryGroupNetworkResources { group_keys });
        }
        debug!(peers = trusted.len(), groups, "Asked for free slots");
    }

    // =========================================================================
    // ANSWERING
    // =========================================================================

    pub(crate) fn report_network_resources(&self, peer: PeerId) {
        if self.free_local_slots == 0 {
            return;
        }
        self.send(peer, &Packet::NetworkResourcesAvailable(self.local_resources()));
    }

    pub(crate) fn on_group_resource_query(&self, peer: PeerId, group_keys: &[Vec<u8>]) {
        if self.free_local_slots == 0 {
            return;
        }
        let Some(querier) = self.peers.get(&peer) else {
            return;
        };
        let Some((group_key, group_private_key)) =
            select_membership(&self.trust, group_keys, self.config.max_group_query_keys)
        else {
            return;
        };

        let proof = MembershipProof::create(
            &group_key,
            group_private_key,
            querier,
            self.trust.public_key(),
        );
        debug!(%peer, group = %fingerprint(&group_key), "Answering group slot query");
        self.send(
            peer,
            &Packet::GroupNetworkResourcesAvailable {
                proof,
                resources: self.local_resources(),
            },
        );
    }

    // =========================================================================
    // RECEIVING ADVERTISEMENTS
    // =========================================================================

    pub(crate) fn on_network_resources(
        &mut self,
        peer: PeerId,
        resources: Resources,
    ) -> Result<(), JobExchangeError> {
        let trusted = self
            .peers
            .get(&peer)
            .is_some_and(|key| self.trust.is_trusted_peer(key));
        if !trusted {
            debug!(%peer, "Slot advertisement from untrusted peer dropped");
            return Ok(());
        }
        self.record_slots(peer, resources)
    }

    pub(crate) fn on_group_network_resources(
        &mut self,
        peer: PeerId,
        proof: &MembershipProof,
        resources: Resources,
    ) -> Result<(), JobExchangeError> {
        let Some(responder) = self.peers.get(&peer) else {
            return Ok(());
        };
        match proof.verify(&self.trust, responder) {
            Ok(group) => {
                debug!(%peer, group = %group.name, "Group membership proof accepted");
            }
            Err(rejection) => {
                debug!(%peer, %rejection, "Group slot advertisement dropped");
                return Ok(());
            }
        }
        self.record_slots(peer, resources)
    }

    fn record_slots(&mut self, peer: PeerId, resources: Resources) -> Result<(), JobExchangeError> {
        let offered = resources.slots;
        match self
            .slots
            .record(FreeCompilerSlots::new(peer, offered, resources.toolchains))
        {
            RecordOutcome::Recorded { accepted } => {
                debug!(%peer, offered, accepted, free = self.slots.free_slot_count(), "Free slots recorded");
                self.create_requests()
            }
            RecordOutcome::IgnoredEmpty | RecordOutcome::RejectedCeiling => Ok(()),
        }
    }

    // =========================================================================
    // NODE STATUS
    // =========================================================================

    pub(crate) fn report_node_status(&self, peer: PeerId) {
        let payload = NodeStatusPayload {
            status: self.node_status(),
            peer_name: self.trust.peer_name().to_owned(),
            groups: self
                .trust
                .memberships()
                .map(|m| (m.name.clone(), m.public_key.to_der()))
                .collect(),
        };
        self.send(peer, &Packet::NodeStatus(payload));
    }

    pub(crate) fn on_node_status(&self, peer: PeerId, payload: NodeStatusPayload) {
        let Some(public_key) = self.peers.get(&peer).copied() else {
            return;
        };

        let mut groups = Vec::with_capacity(payload.groups.len());
        for (name, der) in payload.groups {
            match PublicKey::from_der(&der) {
                Ok(group_key) => groups.push(GroupInfo {
                    name,
                    public_key: group_key,
                }),
                Err(error) => {
                    warn!(%peer, group = %name, %error, "Invalid group key in node status, list cut");
                    break;
                }
            }
        }

        let report = PeerStatusReport {
            peer,
            fingerprint: fingerprint(&public_key),
            public_key,
            peer_name: payload.peer_name,
            status: payload.status,
            groups,
        };
        info!(
            %peer,
            name = %report.peer_name,
            local = report.status.local_jobs,
            delegated = report.status.delegated_jobs,
            remote = report.status.remote_jobs,
            "Node status received"
        );
        self.publish(JobExchangeEvent::NodeStatusReceived(report));
    }
}
