//! # Driving Ports (Inbound API)

use std::path::PathBuf;

use bytes::Bytes;
use cn_01_trust_store::{TrustChange, TrustStore};
use shared_crypto::{PrivateKey, PublicKey};
use shared_types::{JobId, PeerId};

use crate::domain::{Job, JobExchangeError, JobResult, Toolchain};

/// Everything that can happen to a node, as one explicit event type.
#[derive(Debug)]
pub enum NetworkEvent {
    PeerConnected {
        peer: PeerId,
        public_key: PublicKey,
    },
    PeerDisconnected {
        peer: PeerId,
    },
    PacketReceived {
        peer: PeerId,
        payload: Bytes,
    },
    PreprocessingFinished {
        job: JobId,
        result: JobResult,
        files: Vec<PathBuf>,
    },
    ExecutionFinished {
        job: JobId,
        result: JobResult,
    },
    /// Fire protocol timers that are due.
    Tick,
}

/// Primary API of the job exchange.
///
/// Every method runs to completion before the next one is called; the
/// implementation is a single-threaded state machine.
pub trait JobExchangeApi {
    /// Process one event. An error is a fatal local I/O failure.
    fn handle(&mut self, event: NetworkEvent) -> Result<(), JobExchangeError>;

    /// Queue a local job for delegation. Returns the id used in every later
    /// event about it.
    fn submit_job(&mut self, job: Job) -> Result<JobId, JobExchangeError>;

    /// Take back a queued job to compile locally, least worked-on first.
    fn cancel_outgoing_job(&mut self) -> Option<Job>;

    /// Give up on an incoming job; the origin gets "not executed".
    fn reject_incoming_job(&mut self, job: JobId) -> bool;

    /// Slots this node offers to others.
    fn set_free_local_slots(&mut self, slots: u32);

    fn set_toolchains(&mut self, toolchains: Vec<Toolchain>);

    fn set_thread_counts(&mut self, max_threads: u16, current_threads: u16);

    fn query_network_status(&mut self);

    // --- trust management ---------------------------------------------------

    fn trust(&self) -> &TrustStore;

    fn add_trusted_peer(&mut self, name: String, public_key: PublicKey) -> TrustChange;

    fn remove_trusted_peer(&mut self, public_key: &PublicKey) -> bool;

    fn add_trusted_group(&mut self, name: String, public_key: PublicKey) -> bool;

    fn remove_trusted_group(&mut self, public_key: &PublicKey) -> bool;

    fn add_group_membership(&mut self, name: String, private_key: PrivateKey) -> bool;

    fn remove_group_membership(&mut self, public_key: &PublicKey) -> bool;

    fn set_peer_name(&mut self, name: String);
}
