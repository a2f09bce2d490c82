//! # Node Runtime
//!
//! Owns the job exchange and drives it from one tokio task:
//!
//! ```text
//!  TcpTransport ──┐
//!  ProcessExecutor┼─ NetworkEvent ─┐
//!  tick (250ms) ──┘                │
//!                                  ▼
//!  NodeHandle ── Command ──▶  NodeRuntime::run ──▶ JobExchangeService
//!                                  ▲                      │
//!                                  └── JobExchangeEvent ──┘
//! ```
//!
//! The service is never shared: adapters and handles only post messages,
//! and the loop applies them one at a time.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cn_01_trust_store::{TrustConfigStore, TrustStore};
use cn_03_job_exchange::{
    Job, JobExchangeApi, JobExchangeEvent, JobExchangePorts, JobExchangeService, NetworkEvent,
};
use shared_crypto::{PrivateKey, PublicKey};
use shared_types::{JobId, PeerId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::adapters::{
    ChannelEventSink, ProcessExecutor, ScratchFileStore, SystemTimeSource, TcpTransport,
};
use crate::config::NodeConfig;

/// Interval of the timer tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub type NodeService =
    JobExchangeService<TcpTransport, ProcessExecutor, ScratchFileStore, ChannelEventSink>;

/// Requests from outside the runtime task.
#[derive(Debug)]
pub enum Command {
    SubmitJob {
        job: Job,
        reply: oneshot::Sender<JobId>,
    },
    CancelOutgoingJob {
        reply: oneshot::Sender<Option<Job>>,
    },
    SetFreeLocalSlots(u32),
    QueryNetworkStatus,
    AddTrustedPeer {
        name: String,
        public_key: PublicKey,
    },
    RemoveTrustedPeer(PublicKey),
    AddTrustedGroup {
        name: String,
        public_key: PublicKey,
    },
    AddGroupMembership {
        name: String,
        private_key: PrivateKey,
    },
}

/// Cloneable handle for talking to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<Command>,
    transport: Arc<TcpTransport>,
    shutdown: Arc<watch::Sender<bool>>,
    listen_addr: SocketAddr,
}

impl NodeHandle {
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub async fn connect(&self, addr: SocketAddr) -> Result<PeerId> {
        self.transport
            .connect(addr)
            .await
            .with_context(|| format!("connecting to {addr}"))
    }

    pub fn disconnect(&self, peer: PeerId) -> bool {
        self.transport.disconnect(peer)
    }

    /// Queue a job for delegation.
    pub async fn submit_job(&self, job: Job) -> Result<JobId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SubmitJob { job, reply })?;
        rx.await.map_err(|_| anyhow!("node stopped before accepting the job"))
    }

    /// Take back the least worked-on queued job. Its scratch preprocessing
    /// output is removed, so the job comes back as `Waiting`.
    pub async fn cancel_outgoing_job(&self) -> Result<Option<Job>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CancelOutgoingJob { reply })?;
        rx.await.map_err(|_| anyhow!("node stopped"))
    }

    pub fn set_free_local_slots(&self, slots: u32) -> Result<()> {
        self.send(Command::SetFreeLocalSlots(slots))
    }

    pub fn query_network_status(&self) -> Result<()> {
        self.send(Command::QueryNetworkStatus)
    }

    pub fn add_trusted_peer(&self, name: impl Into<String>, public_key: PublicKey) -> Result<()> {
        self.send(Command::AddTrustedPeer {
            name: name.into(),
            public_key,
        })
    }

    pub fn remove_trusted_peer(&self, public_key: PublicKey) -> Result<()> {
        self.send(Command::RemoveTrustedPeer(public_key))
    }

    pub fn add_trusted_group(&self, name: impl Into<String>, public_key: PublicKey) -> Result<()> {
        self.send(Command::AddTrustedGroup {
            name: name.into(),
            public_key,
        })
    }

    pub fn add_group_membership(
        &self,
        name: impl Into<String>,
        private_key: PrivateKey,
    ) -> Result<()> {
        self.send(Command::AddGroupMembership {
            name: name.into(),
            private_key,
        })
    }

    /// Ask the loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("node stopped"))
    }
}

/// Service plus the side effects the loop performs for it.
struct Node {
    service: NodeService,
    files: Arc<ScratchFileStore>,
    trust_store: Arc<dyn TrustConfigStore>,
    subscriber: Option<mpsc::UnboundedSender<JobExchangeEvent>>,
}

/// The node: service, adapters and the channels between them.
pub struct NodeRuntime {
    node: Node,
    handle: NodeHandle,
    network_rx: mpsc::UnboundedReceiver<NetworkEvent>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    job_events_rx: mpsc::UnboundedReceiver<JobExchangeEvent>,
    shutdown_rx: watch::Receiver<bool>,
    tick_interval: Duration,
}

impl NodeRuntime {
    /// Build the adapters, start listening and configure the service.
    pub async fn start(
        config: &NodeConfig,
        trust: TrustStore,
        trust_store: Arc<dyn TrustConfigStore>,
    ) -> Result<Self> {
        let (network_tx, network_rx) = mpsc::unbounded_channel();
        let (job_events_tx, job_events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scratch_dir: PathBuf = config.node.scratch_dir.clone();
        let files = Arc::new(
            ScratchFileStore::new(&scratch_dir)
                .with_context(|| format!("creating scratch dir {}", scratch_dir.display()))?,
        );
        let transport = TcpTransport::new(*trust.public_key(), network_tx.clone());
        let executor = Arc::new(ProcessExecutor::new(network_tx, &scratch_dir));
        let events = Arc::new(ChannelEventSink::new(job_events_tx));

        info!(
            peer_name = trust.peer_name(),
            fingerprint = %shared_crypto::fingerprint(trust.public_key()),
            "Starting CompileNet node"
        );

        let mut service = JobExchangeService::new(
            config.job_exchange(),
            trust,
            JobExchangePorts {
                transport: Arc::clone(&transport),
                executor,
                files: Arc::clone(&files),
                events,
                time_source: Box::new(SystemTimeSource),
            },
        );
        service.set_toolchains(config.toolchains());
        service.set_thread_counts(config.node.max_threads, 0);
        service.set_free_local_slots(config.node.free_slots);

        let listen_addr = transport
            .listen(config.network.listen)
            .await
            .with_context(|| format!("binding {}", config.network.listen))?;

        Ok(Self {
            node: Node {
                service,
                files,
                trust_store,
                subscriber: None,
            },
            handle: NodeHandle {
                commands: commands_tx,
                transport,
                shutdown: Arc::new(shutdown_tx),
                listen_addr,
            },
            network_rx,
            commands_rx,
            job_events_rx,
            shutdown_rx,
            tick_interval: TICK_INTERVAL,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Receive job results and status reports. Without a subscriber they
    /// are only logged.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<JobExchangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.node.subscriber = Some(tx);
        rx
    }

    /// Process events until shutdown or a fatal local failure.
    pub async fn run(self) -> Result<()> {
        let NodeRuntime {
            mut node,
            handle,
            mut network_rx,
            mut commands_rx,
            mut job_events_rx,
            mut shutdown_rx,
            tick_interval,
        } = self;
        // Keeps the command channel open while the loop runs.
        let _handle = handle;

        let mut tick = tokio::time::interval(tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(event) = network_rx.recv() => node.dispatch(event)?,
                Some(command) = commands_rx.recv() => node.execute(command)?,
                Some(event) = job_events_rx.recv() => node.on_job_event(event),
                _ = tick.tick() => node.dispatch(NetworkEvent::Tick)?,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        while let Ok(event) = job_events_rx.try_recv() {
            node.on_job_event(event);
        }
        node.save_trust();
        info!("Node stopped");
        Ok(())
    }
}

impl Node {
    fn dispatch(&mut self, event: NetworkEvent) -> Result<()> {
        self.service.handle(event).map_err(|e| {
            error!(error = %e, "Fatal local failure, stopping node");
            anyhow::Error::new(e).context("job exchange failed")
        })
    }

    fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SubmitJob { job, reply } => {
                let id = self.service.submit_job(job).map_err(|e| {
                    error!(error = %e, "Fatal local failure on submit, stopping node");
                    anyhow::Error::new(e).context("job exchange failed")
                })?;
                // Caller may have given up waiting.
                let _ = reply.send(id);
            }
            Command::CancelOutgoingJob { reply } => {
                let job = self.service.cancel_outgoing_job().map(|mut job| {
                    self.files.release_job_files(&mut job);
                    job
                });
                let _ = reply.send(job);
            }
            Command::SetFreeLocalSlots(slots) => self.service.set_free_local_slots(slots),
            Command::QueryNetworkStatus => self.service.query_network_status(),
            Command::AddTrustedPeer { name, public_key } => {
                let change = self.service.add_trusted_peer(name, public_key);
                debug!(?change, "Trusted peer updated");
            }
            Command::RemoveTrustedPeer(public_key) => {
                self.service.remove_trusted_peer(&public_key);
            }
            Command::AddTrustedGroup { name, public_key } => {
                self.service.add_trusted_group(name, public_key);
            }
            Command::AddGroupMembership { name, private_key } => {
                self.service.add_group_membership(name, private_key);
            }
        }
        Ok(())
    }

    fn on_job_event(&mut self, mut event: JobExchangeEvent) {
        match &mut event {
            JobExchangeEvent::TrustChanged => {
                self.save_trust();
                return;
            }
            JobExchangeEvent::LocalJobFinished(job) => {
                let code = job.result().map_or(-1, |r| r.return_code);
                info!(job = %job.id(), return_code = code, "Job finished");
                self.files.release_job_files(job);
            }
            JobExchangeEvent::LocalJobCancelled(job) => {
                info!(job = %job.id(), "Job handed back for local compilation");
                self.files.release_job_files(job);
            }
            JobExchangeEvent::NodeStatusReceived(report) => {
                info!(
                    peer = %report.peer,
                    peer_name = %report.peer_name,
                    fingerprint = %report.fingerprint,
                    max_threads = report.status.max_threads,
                    remote_jobs = report.status.remote_jobs,
                    "Node status"
                );
            }
        }
        if let Some(subscriber) = &self.subscriber {
            if subscriber.send(event).is_err() {
                debug!("Subscriber gone");
                self.subscriber = None;
            }
        }
    }

    fn save_trust(&self) {
        let config = match self.service.trust_config() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Cannot snapshot trust data");
                return;
            }
        };
        match self.trust_store.save(&config) {
            Ok(()) => debug!("Trust data saved"),
            Err(e) => warn!(error = %e, "Cannot save trust data"),
        }
    }
}
