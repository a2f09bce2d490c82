//! Domain layer: pure protocol state, no I/O.

pub mod config;
pub mod delegation;
pub mod errors;
pub mod group_proof;
pub mod job;
pub mod job_queue;
pub mod requests;
pub mod status;
pub mod timers;

pub use config::JobExchangeConfig;
pub use delegation::{DelegationTracker, IncomingJob, OutgoingJob, PeerDelegations};
pub use errors::JobExchangeError;
pub use group_proof::{select_membership, MembershipProof, ProofRejection};
pub use job::{Job, JobResult, JobStage, Toolchain};
pub use job_queue::JobQueue;
pub use requests::{IncomingJobRequest, OutgoingJobRequest, PeerRequests, RequestBook};
pub use status::{GroupInfo, NodeStatus, PeerStatusReport};
pub use timers::{TimerKind, TimerQueue, TimerToken};
