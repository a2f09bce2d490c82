use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cn_01_trust_store::{TrustConfig, TrustStore};
use cn_02_slot_market::SlotMarket;
use shared_crypto::PublicKey;
use shared_types::{JobId, PeerId, Timestamp};
use tracing::{debug, info, warn};

use crate::domain::status::clamp_count;
use crate::domain::{
    DelegationTracker, JobExchangeConfig, JobExchangeError, JobQueue, JobStage, NodeStatus,
    RequestBook, TimerKind, TimerQueue, Toolchain,
};
use crate::ports::{
    CompilerExecutor, FileStore, JobEventSink, JobExchangeEvent, NetworkEvent, TimeSource,
    Transport,
};
use crate::wire::{Packet, WireLimits};

/// Driven ports handed to [`JobExchangeService::new`].
pub struct JobExchangePorts<T, C, F, E> {
    pub transport: Arc<T>,
    pub executor: Arc<C>,
    pub files: Arc<F>,
    pub events: Arc<E>,
    pub time_source: Box<dyn TimeSource>,
}

/// The job exchange state machine.
///
/// Owns every protocol record. All mutation happens inside
/// [`JobExchangeApi`](crate::ports::JobExchangeApi) calls, one at a time.
pub struct JobExchangeService<T, C, F, E> {
    pub(crate) config: JobExchangeConfig,
    pub(crate) limits: WireLimits,
    pub(crate) trust: TrustStore,
    pub(crate) slots: SlotMarket,
    pub(crate) queue: JobQueue,
    pub(crate) requests: RequestBook,
    pub(crate) delegations: DelegationTracker,
    pub(crate) timers: TimerQueue,
    /// Connected peers and the key they authenticated with.
    pub(crate) peers: HashMap<PeerId, PublicKey>,
    pub(crate) toolchains: Vec<Toolchain>,
    pub(crate) free_local_slots: u32,
    pub(crate) max_threads: u16,
    pub(crate) current_threads: u16,
    next_job_id: u64,
    pub(crate) transport: Arc<T>,
    pub(crate) executor: Arc<C>,
    pub(crate) files: Arc<F>,
    pub(crate) events: Arc<E>,
    time_source: Box<dyn TimeSource>,
}

impl<T, C, F, E> JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    /// Create the service and join the overlay channel of every trusted
    /// group.
    pub fn new(config: JobExchangeConfig, trust: TrustStore, ports: JobExchangePorts<T, C, F, E>) -> Self {
        let slots = SlotMarket::new(config.slot_market.clone());
        Self::with_slot_market(config, trust, ports, slots)
    }

    /// Like [`new`](Self::new) with a seeded slot selection order.
    pub fn with_seed(
        config: JobExchangeConfig,
        trust: TrustStore,
        ports: JobExchangePorts<T, C, F, E>,
        seed: u64,
    ) -> Self {
        let slots = SlotMarket::with_seed(config.slot_market.clone(), seed);
        Self::with_slot_market(config, trust, ports, slots)
    }

    fn with_slot_market(
        config: JobExchangeConfig,
        trust: TrustStore,
        ports: JobExchangePorts<T, C, F, E>,
        slots: SlotMarket,
    ) -> Self {
        for group in trust.trusted_groups() {
            ports.transport.join_group(group.service_id);
        }
        Self {
            limits: WireLimits {
                max_group_query_keys: config.max_group_query_keys,
            },
            config,
            trust,
            slots,
            queue: JobQueue::new(),
            requests: RequestBook::new(),
            delegations: DelegationTracker::new(),
            timers: TimerQueue::new(),
            peers: HashMap::new(),
            toolchains: Vec::new(),
            free_local_slots: 0,
            max_threads: 0,
            current_threads: 0,
            next_job_id: 0,
            transport: ports.transport,
            executor: ports.executor,
            files: ports.files,
            events: ports.events,
            time_source: ports.time_source,
        }
    }

    // =========================================================================
    // EVENT ENTRY POINT
    // =========================================================================

    pub(crate) fn handle_event(&mut self, event: NetworkEvent) -> Result<(), JobExchangeError> {
        match event {
            NetworkEvent::PeerConnected { peer, public_key } => {
                self.on_peer_connected(peer, public_key)
            }
            NetworkEvent::PeerDisconnected { peer } => self.on_peer_disconnected(peer),
            NetworkEvent::PacketReceived { peer, payload } => self.on_packet(peer, &payload),
            NetworkEvent::PreprocessingFinished { job, result, files } => {
                self.on_preprocessing_finished(job, result, files)
            }
            NetworkEvent::ExecutionFinished { job, result } => {
                self.on_execution_finished(job, result)
            }
            NetworkEvent::Tick => self.fire_due_timers(),
        }
    }

    fn fire_due_timers(&mut self) -> Result<(), JobExchangeError> {
        let now = self.now();
        while let Some((token, kind)) = self.timers.pop_due(now) {
            match kind {
                TimerKind::OutgoingRequest { peer, id } => {
                    self.on_outgoing_request_timeout(token, peer, id)?
                }
                TimerKind::IncomingRequest { peer, id } => {
                    self.on_incoming_request_timeout(token, peer, id)
                }
                TimerKind::OutgoingJob { peer, id } => {
                    self.on_outgoing_job_timeout(token, peer, id)?
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // PEERS
    // =========================================================================

    fn on_peer_connected(&mut self, peer: PeerId, public_key: PublicKey) -> Result<(), JobExchangeError> {
        if self.trust.bind_peer(&public_key, peer) {
            info!(%peer, key = ?public_key, "Trusted peer connected");
        } else {
            debug!(%peer, key = ?public_key, "Peer connected");
        }
        self.peers.insert(peer, public_key);
        // The new peer may have slots to offer.
        self.create_requests()
    }

    /// Purge every record that references `peer`. Jobs it held go back to
    /// the queue, jobs it sent us are cancelled.
    fn on_peer_disconnected(&mut self, peer: PeerId) -> Result<(), JobExchangeError> {
        if self.peers.remove(&peer).is_none() {
            return Ok(());
        }
        self.trust.unbind_peer(peer);

        let requests = self.requests.drain_peer(peer);
        for request in requests.outgoing.iter().chain(&requests.parked) {
            self.timers.cancel(request.timer);
        }
        for request in &requests.incoming {
            self.timers.cancel(request.timer);
        }

        let delegations = self.delegations.drain_peer(peer);
        let requeued = delegations.outgoing.len();
        for outgoing in delegations.outgoing {
            self.timers.cancel(outgoing.timer);
            let mut job = outgoing.job;
            job.advance(JobStage::Preprocessed);
            self.queue.enqueue(job);
        }
        let aborted = delegations.incoming.len();
        for incoming in delegations.incoming {
            self.executor.cancel(incoming.job.id());
            self.remove_temp_files(&incoming.temp_files);
        }

        let slots = self.slots.discard(peer);
        info!(
            %peer,
            requeued,
            aborted,
            requests = requests.outgoing.len() + requests.parked.len() + requests.incoming.len(),
            slots,
            "Peer disconnected"
        );
        self.create_requests()
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub(crate) fn deadline(&self, timeout: Duration) -> Timestamp {
        self.now().saturating_add(timeout)
    }

    pub(crate) fn allocate_job_id(&mut self) -> JobId {
        self.next_job_id += 1;
        JobId(self.next_job_id)
    }

    /// Encode and send. A peer that went away is not an error here; its
    /// disconnect event cleans up.
    pub(crate) fn send(&self, peer: PeerId, packet: &Packet) {
        match packet.encode() {
            Ok(frame) => {
                if let Err(error) = self.transport.send(peer, frame) {
                    debug!(%peer, %error, packet_type = ?packet.packet_type(), "Send failed");
                }
            }
            Err(error) => warn!(%peer, %error, "Packet not encodable"),
        }
    }

    pub(crate) fn broadcast(&self, packet: &Packet) {
        match packet.encode() {
            Ok(frame) => self.transport.broadcast(frame),
            Err(error) => warn!(%error, "Packet not encodable"),
        }
    }

    pub(crate) fn publish(&self, event: JobExchangeEvent) {
        self.events.publish(event);
    }

    pub(crate) fn remove_temp_files(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(error) = self.files.remove(path) {
                if error.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), %error, "Temporary file not removed");
                }
            }
        }
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    pub fn config(&self) -> &JobExchangeConfig {
        &self.config
    }

    pub fn slot_market(&self) -> &SlotMarket {
        &self.slots
    }

    pub fn job_queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Requests awaiting a reply plus parked acceptances.
    pub fn outstanding_requests(&self) -> usize {
        self.requests.outstanding_count()
    }

    pub fn parked_acceptances(&self) -> usize {
        self.requests.parked_count()
    }

    pub fn incoming_requests(&self) -> usize {
        self.requests.incoming_count()
    }

    pub fn delegated_jobs(&self) -> usize {
        self.delegations.outgoing_count()
    }

    pub fn incoming_jobs(&self) -> usize {
        self.delegations.incoming_count()
    }

    pub fn connected_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn free_local_slots(&self) -> u32 {
        self.free_local_slots
    }

    /// Earliest armed protocol timeout, for hosts that sleep until it.
    pub fn next_timer_deadline(&mut self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    pub fn node_status(&self) -> NodeStatus {
        NodeStatus {
            max_threads: self.max_threads,
            current_threads: self.current_threads,
            local_jobs: clamp_count(self.queue.len()),
            delegated_jobs: clamp_count(self.delegations.outgoing_count()),
            remote_jobs: clamp_count(self.delegations.incoming_count()),
        }
    }

    /// Snapshot of the trust data for persisting.
    pub fn trust_config(&self) -> Result<TrustConfig, JobExchangeError> {
        Ok(self.trust.to_config()?)
    }
}
