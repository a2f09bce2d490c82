//! # Simulated Network
//!
//! Wires several [`TestNode`]s together. Node `i` is known to every other
//! node as `PeerId(i + 1)`. Frames leave a node through its
//! `RecordingTransport` and are handed, still encoded, to the receiving
//! service by [`SimNetwork::pump`]. Broadcasts reach every linked node.
//!
//! Compiler work is completed explicitly with
//! [`finish_preprocessing`](SimNetwork::finish_preprocessing) and
//! [`finish_execution`](SimNetwork::finish_execution).

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use cn_03_job_exchange::test_utils::TestNode;
use cn_03_job_exchange::{
    JobExchangeApi, JobExchangeConfig, JobExchangeError, JobResult, NetworkEvent,
};
use shared_types::PeerId;

/// Rounds after which [`SimNetwork::pump`] assumes a message loop.
const MAX_PUMP_ROUNDS: usize = 64;

pub struct SimNetwork {
    pub nodes: Vec<TestNode>,
    links: HashSet<(usize, usize)>,
}

impl SimNetwork {
    /// Nodes named after `names`, with identity seeds `1..`.
    pub fn new(names: &[&str], config: JobExchangeConfig) -> Self {
        let nodes = names
            .iter()
            .zip(1u8..)
            .map(|(name, seed)| TestNode::new(name, seed, config.clone()))
            .collect();
        Self {
            nodes,
            links: HashSet::new(),
        }
    }

    /// How node `i` addresses everyone else.
    pub fn peer_id(i: usize) -> PeerId {
        PeerId(i as u64 + 1)
    }

    fn index(peer: PeerId) -> usize {
        (peer.0 - 1) as usize
    }

    pub fn node(&mut self, i: usize) -> &mut TestNode {
        &mut self.nodes[i]
    }

    /// Connect `a` and `b` in both directions.
    pub fn link(&mut self, a: usize, b: usize) -> Result<(), JobExchangeError> {
        self.links.insert((a, b));
        self.links.insert((b, a));
        let a_key = self.nodes[a].public_key();
        let b_key = self.nodes[b].public_key();
        self.nodes[a].connect(Self::peer_id(b), b_key)?;
        self.nodes[b].connect(Self::peer_id(a), a_key)
    }

    /// Drop the link; both sides see a disconnect.
    pub fn unlink(&mut self, a: usize, b: usize) -> Result<(), JobExchangeError> {
        self.links.remove(&(a, b));
        self.links.remove(&(b, a));
        self.nodes[a].transport.disconnect(Self::peer_id(b));
        self.nodes[b].transport.disconnect(Self::peer_id(a));
        self.nodes[a].service.handle(NetworkEvent::PeerDisconnected {
            peer: Self::peer_id(b),
        })?;
        self.nodes[b].service.handle(NetworkEvent::PeerDisconnected {
            peer: Self::peer_id(a),
        })
    }

    pub fn trust_each_other(&mut self, a: usize, b: usize) {
        let a_key = self.nodes[a].public_key();
        let b_key = self.nodes[b].public_key();
        let a_name = self.nodes[a].service.trust().peer_name().to_owned();
        let b_name = self.nodes[b].service.trust().peer_name().to_owned();
        self.nodes[a].service.add_trusted_peer(b_name, b_key);
        self.nodes[b].service.add_trusted_peer(a_name, a_key);
    }

    /// Drain node `from`'s outgoing frames as `(to, frame)`, broadcasts
    /// expanded to every linked node.
    pub fn outbox(&mut self, from: usize) -> Vec<(usize, Bytes)> {
        let transport = &self.nodes[from].transport;
        let mut frames: Vec<(usize, Bytes)> = transport
            .take_sent_frames()
            .into_iter()
            .map(|(peer, frame)| (Self::index(peer), frame))
            .collect();
        for packet in transport.take_broadcasts() {
            let frame = packet.encode().expect("broadcast re-encodes");
            for to in 0..self.nodes.len() {
                if self.links.contains(&(from, to)) {
                    frames.push((to, frame.clone()));
                }
            }
        }
        frames
    }

    /// Deliver one frame as if `from` sent it over their link.
    pub fn deliver(&mut self, from: usize, to: usize, frame: Bytes) -> Result<(), JobExchangeError> {
        if !self.links.contains(&(from, to)) {
            return Ok(());
        }
        self.nodes[to].deliver_frame(Self::peer_id(from), frame)
    }

    /// Route frames until the network is quiet. Returns frames delivered.
    ///
    /// # Panics
    ///
    /// If traffic does not settle.
    pub fn pump(&mut self) -> Result<usize, JobExchangeError> {
        let mut delivered = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut moved = false;
            for from in 0..self.nodes.len() {
                for (to, frame) in self.outbox(from) {
                    self.deliver(from, to, frame)?;
                    delivered += 1;
                    moved = true;
                }
            }
            if !moved {
                return Ok(delivered);
            }
        }
        panic!("network did not settle after {MAX_PUMP_ROUNDS} rounds");
    }

    /// Complete every pending preprocessing order on node `i`: each input
    /// `x` becomes `/pre/x.i` holding the input's bytes.
    pub fn finish_preprocessing(&mut self, i: usize) -> Result<usize, JobExchangeError> {
        let node = &mut self.nodes[i];
        let orders = node.executor.take_preprocessed();
        let count = orders.len();
        for order in orders {
            let mut files = Vec::new();
            for input in &order.input_files {
                let source = node.files.get(order.working_dir.join(input)).unwrap_or_default();
                let out = PathBuf::from("/pre").join(format!("{}.i", input.display()));
                node.files.insert(out.clone(), source);
                files.push(out);
            }
            node.service.handle(NetworkEvent::PreprocessingFinished {
                job: order.job,
                result: JobResult::success(),
                files,
            })?;
        }
        Ok(count)
    }

    /// Complete every pending compile order on node `i`. Outputs get
    /// `object` as their contents when `result` succeeds.
    pub fn finish_execution(
        &mut self,
        i: usize,
        result: JobResult,
        object: &[u8],
    ) -> Result<usize, JobExchangeError> {
        let node = &mut self.nodes[i];
        let orders = node.executor.take_executed();
        let count = orders.len();
        for order in orders {
            if result.is_success() {
                for output in &order.output_files {
                    node.files.insert(output.clone(), object.to_vec());
                }
            }
            node.service.handle(NetworkEvent::ExecutionFinished {
                job: order.job,
                result: result.clone(),
            })?;
        }
        Ok(count)
    }

    /// Advance every clock and fire due timers.
    pub fn tick_all(&mut self, by: Duration) -> Result<(), JobExchangeError> {
        for node in &mut self.nodes {
            node.tick_after(by)?;
        }
        Ok(())
    }
}
