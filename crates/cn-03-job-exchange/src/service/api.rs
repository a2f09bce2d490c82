//! [`JobExchangeApi`] implementation.

use cn_01_trust_store::{TrustChange, TrustStore};
use shared_crypto::{PrivateKey, PublicKey};
use shared_types::JobId;
use tracing::{debug, info};

use super::core::JobExchangeService;
use crate::domain::{Job, JobExchangeError, Toolchain};
use crate::ports::{
    CompilerExecutor, FileStore, JobEventSink, JobExchangeApi, JobExchangeEvent, NetworkEvent,
    Transport,
};
use crate::wire::Packet;

impl<T, C, F, E> JobExchangeApi for JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    fn handle(&mut self, event: NetworkEvent) -> Result<(), JobExchangeError> {
        self.handle_event(event)
    }

    fn submit_job(&mut self, job: Job) -> Result<JobId, JobExchangeError> {
        self.submit(job)
    }

    fn cancel_outgoing_job(&mut self) -> Option<Job> {
        self.take_back_job()
    }

    fn reject_incoming_job(&mut self, job: JobId) -> bool {
        self.reject_incoming(job)
    }

    fn set_free_local_slots(&mut self, slots: u32) {
        if slots != self.free_local_slots {
            debug!(slots, "Free local slots changed");
        }
        self.free_local_slots = slots;
    }

    fn set_toolchains(&mut self, toolchains: Vec<Toolchain>) {
        info!(count = toolchains.len(), "Local toolchains set");
        self.toolchains = toolchains;
    }

    fn set_thread_counts(&mut self, max_threads: u16, current_threads: u16) {
        self.max_threads = max_threads;
        self.current_threads = current_threads;
    }

    fn query_network_status(&mut self) {
        self.broadcast(&Packet::QueryNodeStatus);
    }

    // =========================================================================
    // TRUST MANAGEMENT
    // =========================================================================

    fn trust(&self) -> &TrustStore {
        &self.trust
    }

    fn add_trusted_peer(&mut self, name: String, public_key: PublicKey) -> TrustChange {
        let change = self.trust.add_trusted_peer(name, public_key);
        let connected = self
            .peers
            .iter()
            .find(|(_, key)| **key == public_key)
            .map(|(peer, _)| *peer);
        if let Some(peer) = connected {
            self.trust.bind_peer(&public_key, peer);
        }
        self.publish(JobExchangeEvent::TrustChanged);
        change
    }

    fn remove_trusted_peer(&mut self, public_key: &PublicKey) -> bool {
        let Some(removed) = self.trust.remove_trusted_peer(public_key) else {
            return false;
        };
        if let Some(peer) = removed.peer {
            // Slots it advertised were only accepted because it was trusted.
            let purged = self.slots.discard(peer);
            debug!(%peer, purged, "Slots of untrusted peer discarded");
        }
        self.publish(JobExchangeEvent::TrustChanged);
        true
    }

    fn add_trusted_group(&mut self, name: String, public_key: PublicKey) -> bool {
        let joined = match self.trust.add_trusted_group(name, public_key) {
            Some(service_id) => {
                self.transport.join_group(service_id);
                true
            }
            None => false,
        };
        self.publish(JobExchangeEvent::TrustChanged);
        joined
    }

    fn remove_trusted_group(&mut self, public_key: &PublicKey) -> bool {
        let Some(service_id) = self.trust.remove_trusted_group(public_key) else {
            return false;
        };
        self.transport.leave_group(service_id);
        self.publish(JobExchangeEvent::TrustChanged);
        true
    }

    fn add_group_membership(&mut self, name: String, private_key: PrivateKey) -> bool {
        let added = self.trust.add_group_membership(name, private_key);
        self.publish(JobExchangeEvent::TrustChanged);
        added
    }

    fn remove_group_membership(&mut self, public_key: &PublicKey) -> bool {
        let removed = self.trust.remove_group_membership(public_key).is_some();
        if removed {
            self.publish(JobExchangeEvent::TrustChanged);
        }
        removed
    }

    fn set_peer_name(&mut self, name: String) {
        self.trust.set_peer_name(name);
        self.publish(JobExchangeEvent::TrustChanged);
    }
}
