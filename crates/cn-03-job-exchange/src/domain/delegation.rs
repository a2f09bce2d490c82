//! # Delegation Tracker
//!
//! Jobs that are physically away from, or visiting, this node.
//!
//! | Record | Created on | Removed on |
//! |--------|------------|------------|
//! | [`OutgoingJob`] | delegate after an acceptance | `JobFinished`, timeout, disconnect |
//! | [`IncomingJob`] | `JobData` for an accepted request | execution finished, `AbortJob`, disconnect, reject |
//!
//! Both kinds are keyed by `(peer, request id)`. Incoming jobs are also
//! indexed by [`JobId`] because executor completions only carry the job.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use shared_types::{JobId, PeerId, RequestId};

use super::job::Job;
use super::timers::TimerToken;

/// A job shipped to a remote peer.
#[derive(Debug)]
pub struct OutgoingJob {
    pub peer: PeerId,
    pub id: RequestId,
    pub job: Job,
    pub timer: TimerToken,
    /// `JobDataReceived` arrived; the timer now covers compilation.
    pub acknowledged: bool,
}

/// A job received from a remote peer and executing locally.
#[derive(Debug)]
pub struct IncomingJob {
    pub peer: PeerId,
    pub id: RequestId,
    pub job: Job,
    /// Every temporary input and output file created for the job.
    pub temp_files: Vec<PathBuf>,
}

/// Everything a disconnecting peer still had in flight.
#[derive(Debug, Default)]
pub struct PeerDelegations {
    pub outgoing: Vec<OutgoingJob>,
    pub incoming: Vec<IncomingJob>,
}

#[derive(Debug, Default)]
pub struct DelegationTracker {
    outgoing: BTreeMap<(PeerId, RequestId), OutgoingJob>,
    incoming: BTreeMap<(PeerId, RequestId), IncomingJob>,
    incoming_by_job: HashMap<JobId, (PeerId, RequestId)>,
}

impl DelegationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_outgoing(&mut self, job: OutgoingJob) {
        self.outgoing.insert((job.peer, job.id), job);
    }

    pub fn outgoing_mut(&mut self, peer: PeerId, id: RequestId) -> Option<&mut OutgoingJob> {
        self.outgoing.get_mut(&(peer, id))
    }

    pub fn take_outgoing(&mut self, peer: PeerId, id: RequestId) -> Option<OutgoingJob> {
        self.outgoing.remove(&(peer, id))
    }

    pub fn add_incoming(&mut self, job: IncomingJob) {
        let key = (job.peer, job.id);
        let job_id = job.job.id();
        if let Some(previous) = self.incoming.insert(key, job) {
            self.incoming_by_job.remove(&previous.job.id());
        }
        self.incoming_by_job.insert(job_id, key);
    }

    pub fn take_incoming(&mut self, peer: PeerId, id: RequestId) -> Option<IncomingJob> {
        let job = self.incoming.remove(&(peer, id))?;
        self.incoming_by_job.remove(&job.job.id());
        Some(job)
    }

    pub fn take_incoming_by_job(&mut self, job_id: JobId) -> Option<IncomingJob> {
        let key = self.incoming_by_job.remove(&job_id)?;
        self.incoming.remove(&key)
    }

    pub fn has_incoming(&self, peer: PeerId, id: RequestId) -> bool {
        self.incoming.contains_key(&(peer, id))
    }

    /// Remove every delegation involving `peer`.
    pub fn drain_peer(&mut self, peer: PeerId) -> PeerDelegations {
        let mut drained = PeerDelegations::default();

        let keys: Vec<_> = self.outgoing.keys().filter(|(p, _)| *p == peer).copied().collect();
        for key in keys {
            if let Some(job) = self.outgoing.remove(&key) {
                drained.outgoing.push(job);
            }
        }

        let keys: Vec<_> = self.incoming.keys().filter(|(p, _)| *p == peer).copied().collect();
        for key in keys {
            if let Some(job) = self.incoming.remove(&key) {
                self.incoming_by_job.remove(&job.job.id());
                drained.incoming.push(job);
            }
        }

        drained
    }

    pub fn outgoing_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming.len()
    }
}
