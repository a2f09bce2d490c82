//! # Request Protocol Records
//!
//! ```text
//! Outgoing:  Sent ──Accepted──► (job available) ──► delegation
//!              │                (no job yet)    ──► parked ──preprocessing done──► delegation
//!              ├──Rejected──► dropped, peer slots purged
//!              └──timeout───► dropped, peer slots purged
//!
//! Incoming:  Accepted ──JobData──► incoming job
//!              ├──AbortJob──► dropped
//!              └──timeout───► dropped, "not executed" sent back
//! ```
//!
//! Records are keyed by `(peer, request id)`. Parked acceptances form a
//! stack: the most recently parked one is served first.

use std::collections::BTreeMap;

use shared_types::{PeerId, RequestId};

use super::timers::TimerToken;

/// A `JobRequest` we sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingJobRequest {
    pub peer: PeerId,
    pub id: RequestId,
    /// Armed while awaiting a reply. Parked acceptances carry a disarmed
    /// token.
    pub timer: TimerToken,
}

/// A `JobRequest` we accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingJobRequest {
    pub peer: PeerId,
    pub id: RequestId,
    pub timer: TimerToken,
}

/// Everything a disconnecting peer still had open.
#[derive(Debug, Default)]
pub struct PeerRequests {
    pub outgoing: Vec<OutgoingJobRequest>,
    pub parked: Vec<OutgoingJobRequest>,
    pub incoming: Vec<IncomingJobRequest>,
}

#[derive(Debug)]
pub struct RequestBook {
    next_id: RequestId,
    outgoing: BTreeMap<(PeerId, RequestId), OutgoingJobRequest>,
    parked: Vec<OutgoingJobRequest>,
    incoming: BTreeMap<(PeerId, RequestId), IncomingJobRequest>,
}

impl Default for RequestBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBook {
    pub fn new() -> Self {
        Self {
            next_id: RequestId::FIRST,
            outgoing: BTreeMap::new(),
            parked: Vec::new(),
            incoming: BTreeMap::new(),
        }
    }

    /// Hand out the next request id: 1, 2, 3, ...
    pub fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    pub fn add_outgoing(&mut self, request: OutgoingJobRequest) {
        self.outgoing.insert((request.peer, request.id), request);
    }

    pub fn outgoing(&self, peer: PeerId, id: RequestId) -> Option<&OutgoingJobRequest> {
        self.outgoing.get(&(peer, id))
    }

    pub fn take_outgoing(&mut self, peer: PeerId, id: RequestId) -> Option<OutgoingJobRequest> {
        self.outgoing.remove(&(peer, id))
    }

    pub fn park(&mut self, request: OutgoingJobRequest) {
        self.parked.push(request);
    }

    /// Most recently parked acceptance.
    pub fn pop_parked(&mut self) -> Option<OutgoingJobRequest> {
        self.parked.pop()
    }

    /// Oldest parked acceptance.
    pub fn pop_oldest_parked(&mut self) -> Option<OutgoingJobRequest> {
        if self.parked.is_empty() {
            None
        } else {
            Some(self.parked.remove(0))
        }
    }

    /// Parked acceptance for a specific request.
    pub fn take_parked(&mut self, peer: PeerId, id: RequestId) -> Option<OutgoingJobRequest> {
        let index = self
            .parked
            .iter()
            .position(|r| r.peer == peer && r.id == id)?;
        Some(self.parked.remove(index))
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Requests awaiting a reply plus parked acceptances.
    pub fn outstanding_count(&self) -> usize {
        self.outgoing.len() + self.parked.len()
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    /// Record an accepted request. Returns a previous record with the same
    /// key, whose timer the caller must disarm.
    pub fn add_incoming(&mut self, request: IncomingJobRequest) -> Option<IncomingJobRequest> {
        self.incoming.insert((request.peer, request.id), request)
    }

    pub fn incoming(&self, peer: PeerId, id: RequestId) -> Option<&IncomingJobRequest> {
        self.incoming.get(&(peer, id))
    }

    pub fn take_incoming(&mut self, peer: PeerId, id: RequestId) -> Option<IncomingJobRequest> {
        self.incoming.remove(&(peer, id))
    }

    pub fn incoming_count(&self) -> usize {
        self.incoming.len()
    }

    // =========================================================================
    // DISCONNECT
    // =========================================================================

    /// Remove every record involving `peer`.
    pub fn drain_peer(&mut self, peer: PeerId) -> PeerRequests {
        let mut drained = PeerRequests::default();

        let keys: Vec<_> = self.outgoing.keys().filter(|(p, _)| *p == peer).copied().collect();
        for key in keys {
            if let Some(request) = self.outgoing.remove(&key) {
                drained.outgoing.push(request);
            }
        }

        let (gone, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.parked).into_iter().partition(|r| r.peer == peer);
        self.parked = kept;
        drained.parked = gone;

        let keys: Vec<_> = self.incoming.keys().filter(|(p, _)| *p == peer).copied().collect();
        for key in keys {
            if let Some(request) = self.incoming.remove(&key) {
                drained.incoming.push(request);
            }
        }

        drained
    }
}
