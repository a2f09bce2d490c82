//! Deterministic port doubles for driving a [`JobExchangeService`] without
//! sockets, processes or a real clock.
//!
//! Enable with the `test-utils` feature flag.
//!
//! ```rust
//! use std::time::Duration;
//! use cn_03_job_exchange::test_utils::ManualClock;
//! use cn_03_job_exchange::TimeSource;
//!
//! let clock = ManualClock::new(1_000);
//! clock.advance(Duration::from_secs(2));
//! assert_eq!(clock.now().as_millis(), 3_000);
//! ```

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cn_01_trust_store::TrustStore;
use parking_lot::Mutex;
use shared_crypto::{GroupServiceId, PrivateKey, PublicKey};
use shared_types::{JobId, PeerId, Timestamp};

use crate::domain::{JobExchangeConfig, JobExchangeError};
use crate::ports::{
    CompilerExecutor, ExecuteRequest, FileStore, JobEventSink, JobExchangeApi, JobExchangeEvent,
    NetworkEvent, PreprocessRequest, TimeSource, Transport, TransportError,
};
use crate::service::{JobExchangePorts, JobExchangeService};
use crate::wire::{Packet, WireLimits};

/// Limits that let a test see everything a node put on the wire.
const UNLIMITED: WireLimits = WireLimits {
    max_group_query_keys: usize::MAX,
};

// =============================================================================
// CLOCK
// =============================================================================

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Records every frame instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(PeerId, Bytes)>>,
    broadcasts: Mutex<Vec<Bytes>>,
    joined: Mutex<Vec<GroupServiceId>>,
    left: Mutex<Vec<GroupServiceId>>,
    disconnected: Mutex<HashSet<PeerId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `peer` fail with `NotConnected`.
    pub fn disconnect(&self, peer: PeerId) {
        self.disconnected.lock().insert(peer);
    }

    /// Drain directly sent frames, decoded. Undecodable frames are skipped.
    pub fn take_sent(&self) -> Vec<(PeerId, Packet)> {
        std::mem::take(&mut *self.sent.lock())
            .into_iter()
            .filter_map(|(peer, frame)| Packet::decode(&frame, &UNLIMITED).ok().map(|p| (peer, p)))
            .collect()
    }

    /// Drain directly sent raw frames.
    pub fn take_sent_frames(&self) -> Vec<(PeerId, Bytes)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn take_broadcasts(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.broadcasts.lock())
            .into_iter()
            .filter_map(|frame| Packet::decode(&frame, &UNLIMITED).ok())
            .collect()
    }

    pub fn joined(&self) -> Vec<GroupServiceId> {
        self.joined.lock().clone()
    }

    pub fn left(&self) -> Vec<GroupServiceId> {
        self.left.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, peer: PeerId, packet: Bytes) -> Result<(), TransportError> {
        if self.disconnected.lock().contains(&peer) {
            return Err(TransportError::NotConnected(peer));
        }
        self.sent.lock().push((peer, packet));
        Ok(())
    }

    fn broadcast(&self, packet: Bytes) {
        self.broadcasts.lock().push(packet);
    }

    fn join_group(&self, group: GroupServiceId) {
        self.joined.lock().push(group);
    }

    fn leave_group(&self, group: GroupServiceId) {
        self.left.lock().push(group);
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Records work orders; completions are delivered by the test.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    preprocessed: Mutex<Vec<PreprocessRequest>>,
    executed: Mutex<Vec<ExecuteRequest>>,
    cancelled: Mutex<Vec<JobId>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_preprocessed(&self) -> Vec<PreprocessRequest> {
        std::mem::take(&mut *self.preprocessed.lock())
    }

    pub fn take_executed(&self) -> Vec<ExecuteRequest> {
        std::mem::take(&mut *self.executed.lock())
    }

    pub fn cancelled(&self) -> Vec<JobId> {
        self.cancelled.lock().clone()
    }
}

impl CompilerExecutor for RecordingExecutor {
    fn preprocess(&self, request: PreprocessRequest) {
        self.preprocessed.lock().push(request);
    }

    fn execute(&self, request: ExecuteRequest) {
        self.executed.lock().push(request);
    }

    fn cancel(&self, job: JobId) {
        self.cancelled.lock().push(job);
    }
}

// =============================================================================
// FILES
// =============================================================================

/// In-memory file system. Temp pairs live under `/scratch`.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    next_temp: AtomicU64,
    fail_writes: Mutex<bool>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), contents.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every later `write` fail with `PermissionDenied`.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if *self.fail_writes.lock() {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.insert(path, contents);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn create_temp_pair(
        &self,
        input_suffix: &str,
        output_suffix: &str,
    ) -> io::Result<(PathBuf, PathBuf)> {
        let n = self.next_temp.fetch_add(1, Ordering::SeqCst) + 1;
        let input = PathBuf::from(format!("/scratch/job-{n}{input_suffix}"));
        let output = PathBuf::from(format!("/scratch/job-{n}{output_suffix}"));
        self.insert(&input, Vec::new());
        Ok((input, output))
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<JobExchangeEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<JobExchangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl JobEventSink for CollectingEventSink {
    fn publish(&self, event: JobExchangeEvent) {
        self.events.lock().push(event);
    }
}

// =============================================================================
// TEST NODE
// =============================================================================

pub type TestService =
    JobExchangeService<RecordingTransport, RecordingExecutor, MemoryFileStore, CollectingEventSink>;

/// A service plus handles on all its doubles.
pub struct TestNode {
    pub service: TestService,
    pub transport: Arc<RecordingTransport>,
    pub executor: Arc<RecordingExecutor>,
    pub files: Arc<MemoryFileStore>,
    pub events: Arc<CollectingEventSink>,
    pub clock: ManualClock,
}

impl TestNode {
    /// Node with a deterministic identity derived from `seed`.
    pub fn new(name: &str, seed: u8, config: JobExchangeConfig) -> Self {
        Self::with_trust(TrustStore::new(name, PrivateKey::from_seed([seed; 32])), config)
    }

    pub fn with_trust(trust: TrustStore, config: JobExchangeConfig) -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let executor = Arc::new(RecordingExecutor::new());
        let files = Arc::new(MemoryFileStore::new());
        let events = Arc::new(CollectingEventSink::new());
        let clock = ManualClock::new(1_000);
        let ports = JobExchangePorts {
            transport: Arc::clone(&transport),
            executor: Arc::clone(&executor),
            files: Arc::clone(&files),
            events: Arc::clone(&events),
            time_source: Box::new(clock.clone()),
        };
        Self {
            service: JobExchangeService::with_seed(config, trust, ports, 7),
            transport,
            executor,
            files,
            events,
            clock,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        *self.service.trust().public_key()
    }

    pub fn connect(&mut self, peer: PeerId, public_key: PublicKey) -> Result<(), JobExchangeError> {
        self.service
            .handle(NetworkEvent::PeerConnected { peer, public_key })
    }

    /// Encode `packet` and hand it to the service as if `peer` sent it.
    ///
    /// # Panics
    ///
    /// If `packet` has a field too large for the wire format.
    pub fn deliver(&mut self, peer: PeerId, packet: &Packet) -> Result<(), JobExchangeError> {
        let payload = packet.encode().expect("test packet encodes");
        self.deliver_frame(peer, payload)
    }

    pub fn deliver_frame(&mut self, peer: PeerId, payload: Bytes) -> Result<(), JobExchangeError> {
        self.service
            .handle(NetworkEvent::PacketReceived { peer, payload })
    }

    /// Advance the clock and fire due timers.
    pub fn tick_after(&mut self, by: Duration) -> Result<(), JobExchangeError> {
        self.clock.advance(by);
        self.service.handle(NetworkEvent::Tick)
    }
}
