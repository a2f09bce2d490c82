//! # TCP Transport
//!
//! One TCP connection per peer, carrying length-prefixed frames:
//!
//! ```text
//! ┌──────────────────┬──────────────────────┐
//! │ length (u32, BE) │ payload (length B)   │
//! └──────────────────┴──────────────────────┘
//! ```
//!
//! The first frame in each direction is the sender's DER-encoded public
//! key. After that every frame is one encoded protocol packet. A connection
//! gets a fresh [`PeerId`] once the handshake completes, and the runtime is
//! told through `NetworkEvent::PeerConnected`.
//!
//! Group channels are local bookkeeping only: a group broadcast reaches every
//! connected peer, and receivers filter by trust.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cn_03_job_exchange::{NetworkEvent, Transport, TransportError};
use parking_lot::Mutex;
use shared_crypto::{GroupServiceId, PublicKey};
use shared_types::PeerId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Largest frame accepted from a peer.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Ed25519 SubjectPublicKeyInfo is 44 bytes; leave room for other encodings.
const MAX_HANDSHAKE_FRAME: usize = 1024;

/// Framed TCP links to peers.
pub struct TcpTransport {
    identity: PublicKey,
    events: mpsc::UnboundedSender<NetworkEvent>,
    links: Mutex<HashMap<PeerId, mpsc::UnboundedSender<Bytes>>>,
    groups: Mutex<HashSet<GroupServiceId>>,
    next_peer: AtomicU64,
    max_frame: usize,
}

impl TcpTransport {
    pub fn new(identity: PublicKey, events: mpsc::UnboundedSender<NetworkEvent>) -> Arc<Self> {
        Self::with_max_frame(identity, events, DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(
        identity: PublicKey,
        events: mpsc::UnboundedSender<NetworkEvent>,
        max_frame: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            events,
            links: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashSet::new()),
            next_peer: AtomicU64::new(1),
            max_frame,
        })
    }

    /// Bind `addr` and accept peers in the background. Returns the bound
    /// address.
    pub async fn listen(self: &Arc<Self>, addr: SocketAddr) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!(%local, "Listening for peers");

        let transport = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        let transport = Arc::clone(&transport);
                        tokio::spawn(async move {
                            if let Err(e) = transport.establish(stream).await {
                                warn!(%remote, error = %e, "Inbound handshake failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        Ok(local)
    }

    /// Dial a peer and complete the handshake.
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) -> io::Result<PeerId> {
        let stream = TcpStream::connect(addr).await?;
        Arc::clone(self).establish(stream).await
    }

    /// Close the link to `peer`. The reader notices and reports the
    /// disconnect.
    pub fn disconnect(&self, peer: PeerId) -> bool {
        self.links.lock().remove(&peer).is_some()
    }

    pub fn connected_peers(&self) -> usize {
        self.links.lock().len()
    }

    pub fn joined_groups(&self) -> Vec<GroupServiceId> {
        self.groups.lock().iter().copied().collect()
    }

    async fn establish(self: Arc<Self>, mut stream: TcpStream) -> io::Result<PeerId> {
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;

        write_frame(&mut stream, &self.identity.to_der()).await?;
        let der = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            read_frame(&mut stream, MAX_HANDSHAKE_FRAME),
        )
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))??;
        let public_key = PublicKey::from_der(&der)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let peer = PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.links.lock().insert(peer, tx);
        info!(%peer, %remote, "Peer connected");

        if self
            .events
            .send(NetworkEvent::PeerConnected { peer, public_key })
            .is_err()
        {
            self.links.lock().remove(&peer);
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "runtime stopped"));
        }

        let (reader, writer) = stream.into_split();
        tokio::spawn(write_loop(peer, writer, rx));
        tokio::spawn(Arc::clone(&self).read_loop(peer, reader));
        Ok(peer)
    }

    async fn read_loop<R>(self: Arc<Self>, peer: PeerId, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            match read_frame(&mut reader, self.max_frame).await {
                Ok(frame) => {
                    trace!(%peer, len = frame.len(), "Frame received");
                    let event = NetworkEvent::PacketReceived {
                        peer,
                        payload: Bytes::from(frame),
                    };
                    if self.events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(%peer, error = %e, "Link closed");
                    break;
                }
            }
        }
        self.links.lock().remove(&peer);
        info!(%peer, "Peer disconnected");
        // Runtime may already be gone.
        let _ = self.events.send(NetworkEvent::PeerDisconnected { peer });
    }
}

async fn write_loop<W>(peer: PeerId, mut writer: W, mut rx: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(%peer, error = %e, "Write failed");
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        trace!(%peer, error = %e, "Shutdown after close");
    }
}

async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

async fn read_frame<R>(reader: &mut R, max_len: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {max_len}"),
        ));
    }
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(frame)
}

impl Transport for TcpTransport {
    fn send(&self, peer: PeerId, packet: Bytes) -> Result<(), TransportError> {
        let links = self.links.lock();
        let link = links.get(&peer).ok_or(TransportError::NotConnected(peer))?;
        link.send(packet)
            .map_err(|_| TransportError::Closed(format!("writer for {peer} stopped")))
    }

    fn broadcast(&self, packet: Bytes) {
        for link in self.links.lock().values() {
            // A closed link is reported by its reader.
            let _ = link.send(packet.clone());
        }
    }

    fn join_group(&self, group: GroupServiceId) {
        if self.groups.lock().insert(group) {
            debug!(?group, "Joined group channel");
        }
    }

    fn leave_group(&self, group: GroupServiceId) {
        if self.groups.lock().remove(&group) {
            debug!(?group, "Left group channel");
        }
    }
}
