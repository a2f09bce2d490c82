//! # Driven Ports (Outbound SPI)
//!
//! What the job exchange needs from its host. All calls are made from the
//! single event-processing thread and must not block: long work (compiling,
//! preprocessing) is started here and reported back as a
//! [`NetworkEvent`](super::NetworkEvent).

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use shared_crypto::GroupServiceId;
use shared_types::{JobId, PeerId, Timestamp};
use thiserror::Error;

use crate::domain::{Job, PeerStatusReport};

// =============================================================================
// TRANSPORT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{0} is not connected")]
    NotConnected(PeerId),
    #[error("link closed: {0}")]
    Closed(String),
}

/// Node-to-node message primitive. Framing and link security are the
/// transport's business; the payload is one encoded packet.
pub trait Transport: Send + Sync {
    fn send(&self, peer: PeerId, packet: Bytes) -> Result<(), TransportError>;

    /// Send to every connected peer.
    fn broadcast(&self, packet: Bytes);

    fn join_group(&self, group: GroupServiceId);

    fn leave_group(&self, group: GroupServiceId);
}

// =============================================================================
// COMPILER EXECUTOR
// =============================================================================

/// Run the preprocessor for a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessRequest {
    pub job: JobId,
    pub compiler_path: PathBuf,
    pub language: String,
    pub input_files: Vec<PathBuf>,
    pub parameters: Vec<String>,
    pub working_dir: PathBuf,
    pub stdin: Vec<u8>,
}

impl From<&Job> for PreprocessRequest {
    fn from(job: &Job) -> Self {
        Self {
            job: job.id(),
            compiler_path: job.toolchain.compiler_path.clone(),
            language: job.language.clone(),
            input_files: job.input_files.clone(),
            parameters: job.preprocessor_parameters.clone(),
            working_dir: job.working_dir.clone(),
            stdin: job.stdin.clone(),
        }
    }
}

/// Compile the preprocessed inputs of a job received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub job: JobId,
    pub compiler_path: PathBuf,
    pub language: String,
    pub input_files: Vec<PathBuf>,
    pub output_files: Vec<PathBuf>,
    pub parameters: Vec<String>,
    pub working_dir: PathBuf,
}

impl From<&Job> for ExecuteRequest {
    fn from(job: &Job) -> Self {
        Self {
            job: job.id(),
            compiler_path: job.toolchain.compiler_path.clone(),
            language: job.language.clone(),
            input_files: job.preprocessed_files().to_vec(),
            output_files: job.output_files.clone(),
            parameters: job.compiler_parameters.clone(),
            working_dir: job.working_dir.clone(),
        }
    }
}

/// Starts compiler work. Completion arrives as
/// `NetworkEvent::PreprocessingFinished` / `NetworkEvent::ExecutionFinished`.
pub trait CompilerExecutor: Send + Sync {
    fn preprocess(&self, request: PreprocessRequest);

    fn execute(&self, request: ExecuteRequest);

    /// Stop work for `job`. No completion is expected afterwards; one that
    /// arrives anyway is ignored.
    fn cancel(&self, job: JobId);
}

// =============================================================================
// FILES
// =============================================================================

/// Access to job input/output files and scratch space.
pub trait FileStore: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Create an empty input file and reserve a matching output path in
    /// the scratch area. Returns `(input, output)`.
    fn create_temp_pair(&self, input_suffix: &str, output_suffix: &str)
        -> io::Result<(PathBuf, PathBuf)>;
}

// =============================================================================
// TIME & EVENTS
// =============================================================================

/// Clock driving protocol timeouts.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Notifications for the owner of the node.
#[derive(Debug)]
pub enum JobExchangeEvent {
    /// A locally submitted job has its result: it ran remotely, or its
    /// preprocessing failed.
    LocalJobFinished(Job),
    /// A locally submitted job is handed back because the peer did not run
    /// it or the delegation timed out. The caller decides whether to compile
    /// it locally.
    LocalJobCancelled(Job),
    NodeStatusReceived(PeerStatusReport),
    /// Trust data changed and should be persisted.
    TrustChanged,
}

pub trait JobEventSink: Send + Sync {
    fn publish(&self, event: JobExchangeEvent);
}
