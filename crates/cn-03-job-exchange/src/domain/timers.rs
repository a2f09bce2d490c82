//! # Timer Queue
//!
//! One priority queue of `(deadline, token)` pairs for every protocol
//! timeout. Records store the token of their timer; removing a record
//! cancels the token, and a cancelled token never fires.
//!
//! The queue does not run on its own. The event loop calls
//! [`TimerQueue::pop_due`] on every tick.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use shared_types::{PeerId, RequestId, Timestamp};

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// What a timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// We sent `JobRequest` and wait for accept/reject.
    OutgoingRequest { peer: PeerId, id: RequestId },
    /// We accepted a request and wait for `JobData`.
    IncomingRequest { peer: PeerId, id: RequestId },
    /// We shipped a job and wait for the acknowledgement or the result.
    OutgoingJob { peer: PeerId, id: RequestId },
}

#[derive(Debug)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Timestamp, TimerToken)>>,
    live: HashMap<TimerToken, TimerKind>,
    next_token: u64,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn schedule(&mut self, deadline: Timestamp, kind: TimerKind) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.heap.push(Reverse((deadline, token)));
        self.live.insert(token, kind);
        token
    }

    /// Disarm a timer. Returns what it guarded if it was still armed.
    pub fn cancel(&mut self, token: TimerToken) -> Option<TimerKind> {
        self.live.remove(&token)
    }

    /// Pop the next armed timer whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(TimerToken, TimerKind)> {
        while let Some(Reverse((deadline, token))) = self.heap.peek().copied() {
            if deadline > now {
                return None;
            }
            self.heap.pop();
            if let Some(kind) = self.live.remove(&token) {
                return Some((token, kind));
            }
        }
        None
    }

    /// Earliest deadline among armed timers.
    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        while let Some(Reverse((deadline, token))) = self.heap.peek().copied() {
            if self.live.contains_key(&token) {
                return Some(deadline);
            }
            self.heap.pop();
        }
        None
    }

    pub fn is_armed(&self, token: TimerToken) -> bool {
        self.live.contains_key(&token)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
