//! # Job Exchange
//!
//! The protocol engine of a CompileNet node. It negotiates compile slots
//! with peers, ships preprocessed jobs to them, runs jobs they send us and
//! proves group membership so that untrusted-but-vouched-for peers can
//! share slots.
//!
//! ## Architecture
//!
//! - **Domain Layer:** job queue, request book, delegation tracker, timers,
//!   group proofs; pure state
//! - **Wire:** packet codec, job data compression
//! - **Ports Layer:** [`JobExchangeApi`] in; transport, executor, file
//!   store, clock and event sink out
//! - **Service Layer:** [`JobExchangeService`], a single-threaded state
//!   machine fed one [`NetworkEvent`] at a time
//!
//! ## Lifecycle of a delegated job
//!
//! ```text
//!  origin                                   executor
//!  ──────                                   ────────
//!  QueryNetworkResources ─────────────────►
//!                      ◄───────────────── NetworkResourcesAvailable
//!  JobRequest(id) ────────────────────────►
//!                      ◄───────────────── JobRequestAccepted(id)
//!  JobData(id, files) ────────────────────►
//!                      ◄───────────────── JobDataReceived(id)
//!                      ◄───────────────── JobFinished(id, result)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use cn_03_job_exchange::{Packet, WireLimits};
//! use shared_types::RequestId;
//!
//! let frame = Packet::JobRequest { id: RequestId(1) }.encode().unwrap();
//! assert_eq!(&frame[..], &[0x07, 0, 0, 0, 1]);
//!
//! let decoded = Packet::decode(&frame, &WireLimits::default()).unwrap();
//! assert_eq!(decoded, Packet::JobRequest { id: RequestId(1) });
//! ```

pub mod domain;
pub mod ports;
pub mod service;
pub mod wire;

/// Port doubles for deterministic tests.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::{
    GroupInfo, Job, JobExchangeConfig, JobExchangeError, JobResult, JobStage, MembershipProof,
    NodeStatus, PeerStatusReport, ProofRejection, Toolchain,
};
pub use ports::{
    CompilerExecutor, ExecuteRequest, FileStore, JobEventSink, JobExchangeApi, JobExchangeEvent,
    NetworkEvent, PreprocessRequest, TimeSource, Transport, TransportError,
};
pub use service::{JobExchangePorts, JobExchangeService};
pub use wire::{Packet, PacketType, WireError, WireLimits};
