//! # Wire Format
//!
//! Every packet is a one-byte tag followed by its payload. Field encodings
//! are described in [`codec`].
//!
//! | Tag | Packet | Payload |
//! |-----|--------|---------|
//! | 0x01 | `QueryNodeStatus` | none |
//! | 0x02 | `NodeStatus` | u16 x6 (max, current, local, delegated, remote, group count), str name, groups x (str, bytes) |
//! | 0x03 | `QueryNetworkResources` | none |
//! | 0x04 | `NetworkResourcesAvailable` | u32 slots, list<str> |
//! | 0x05 | `QueryGroupNetworkResources` | u16 count, count x bytes |
//! | 0x06 | `GroupNetworkResourcesAvailable` | bytes group DER, bytes text, bytes signature, u32 slots, list<str> |
//! | 0x07 | `JobRequest` | u32 id |
//! | 0x08 | `JobRequestAccepted` | u32 id |
//! | 0x09 | `JobRequestRejected` | optional u32 id |
//! | 0x0A | `JobData` | u32 id, str toolchain, str language, list<str> params, bool compressed, list<bytes> |
//! | 0x0B | `JobDataReceived` | u32 id |
//! | 0x0C | `JobFinished` | u32 id, bool executed, [i32 code, bytes stdout, bytes stderr, list<bytes>] |
//! | 0x0D | `AbortJob` | u32 id |
//!
//! ## Lenient Spots
//!
//! - `NodeStatus`: a group list cut short ends the list, it does not fail
//!   the packet.
//! - `QueryGroupNetworkResources`: keys past [`WireLimits::max_group_query_keys`]
//!   are not read.
//! - Trailing bytes after a complete payload are ignored.

mod codec;
pub mod compression;


use bytes::Bytes;
use shared_types::RequestId;
use thiserror::Error;

use crate::domain::{MembershipProof, NodeStatus};
use codec::{PacketReader, PacketWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    QueryNodeStatus = 0x01,
    NodeStatus = 0x02,
    QueryNetworkResources = 0x03,
    NetworkResourcesAvailable = 0x04,
    QueryGroupNetworkResources = 0x05,
    GroupNetworkResourcesAvailable = 0x06,
    JobRequest = 0x07,
    JobRequestAccepted = 0x08,
    JobRequestRejected = 0x09,
    JobData = 0x0A,
    JobDataReceived = 0x0B,
    JobFinished = 0x0C,
    AbortJob = 0x0D,
}

impl TryFrom<u8> for PacketType {
    type Error = WireError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        use PacketType::*;
        Ok(match tag {
            0x01 => QueryNodeStatus,
            0x02 => NodeStatus,
            0x03 => QueryNetworkResources,
            0x04 => NetworkResourcesAvailable,
            0x05 => QueryGroupNetworkResources,
            0x06 => GroupNetworkResourcesAvailable,
            0x07 => JobRequest,
            0x08 => JobRequestAccepted,
            0x09 => JobRequestRejected,
            0x0A => JobData,
            0x0B => JobDataReceived,
            0x0C => JobFinished,
            0x0D => AbortJob,
            other => return Err(WireError::UnknownTag(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet tag {0:#04x}")]
    UnknownTag(u8),
    #[error("malformed {packet_type:?}: {reason}")]
    Malformed {
        packet_type: PacketType,
        reason: &'static str,
    },
    #[error("field of {0} elements does not fit its length prefix")]
    FieldTooLarge(usize),
}

/// Decoder limits that depend on node policy.
#[derive(Debug, Clone, Copy)]
pub struct WireLimits {
    pub max_group_query_keys: usize,
}

impl Default for WireLimits {
    fn default() -> Self {
        Self {
            max_group_query_keys: 16,
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeStatusPayload {
    pub status: NodeStatus,
    pub peer_name: String,
    /// `(group name, group DER key)`
    pub groups: Vec<(String, Vec<u8>)>,
}

/// Free slots plus the toolchains they accept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resources {
    pub slots: u32,
    pub toolchains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDataPayload {
    pub id: RequestId,
    pub toolchain: String,
    pub language: String,
    pub parameters: Vec<String>,
    pub compressed: bool,
    pub files: Vec<Vec<u8>>,
}

/// Outcome of a job that actually ran on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteResult {
    pub return_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub files: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFinishedPayload {
    pub id: RequestId,
    /// `None` means "not executed".
    pub outcome: Option<RemoteResult>,
}

impl JobFinishedPayload {
    pub fn not_executed(id: RequestId) -> Self {
        Self { id, outcome: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    QueryNodeStatus,
    NodeStatus(NodeStatusPayload),
    QueryNetworkResources,
    NetworkResourcesAvailable(Resources),
    QueryGroupNetworkResources { group_keys: Vec<Vec<u8>> },
    GroupNetworkResourcesAvailable {
        proof: MembershipProof,
        resources: Resources,
    },
    JobRequest { id: RequestId },
    JobRequestAccepted { id: RequestId },
    JobRequestRejected { id: Option<RequestId> },
    JobData(JobDataPayload),
    JobDataReceived { id: RequestId },
    JobFinished(JobFinishedPayload),
    AbortJob { id: RequestId },
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::QueryNodeStatus => PacketType::QueryNodeStatus,
            Packet::NodeStatus(_) => PacketType::NodeStatus,
            Packet::QueryNetworkResources => PacketType::QueryNetworkResources,
            Packet::NetworkResourcesAvailable(_) => PacketType::NetworkResourcesAvailable,
            Packet::QueryGroupNetworkResources { .. } => PacketType::QueryGroupNetworkResources,
            Packet::GroupNetworkResourcesAvailable { .. } => {
                PacketType::GroupNetworkResourcesAvailable
            }
            Packet::JobRequest { .. } => PacketType::JobRequest,
            Packet::JobRequestAccepted { .. } => PacketType::JobRequestAccepted,
            Packet::JobRequestRejected { .. } => PacketType::JobRequestRejected,
            Packet::JobData(_) => PacketType::JobData,
            Packet::JobDataReceived { .. } => PacketType::JobDataReceived,
            Packet::JobFinished(_) => PacketType::JobFinished,
            Packet::AbortJob { .. } => PacketType::AbortJob,
        }
    }

    // =========================================================================
    // ENCODE
    // =========================================================================

    pub fn encode(&self) -> Result<Bytes, WireError> {
        let mut w = PacketWriter::new(self.packet_type());
        match self {
            Packet::QueryNodeStatus | Packet::QueryNetworkResources => {}
            Packet::NodeStatus(payload) => {
                let s = &payload.status;
                let group_count = u16::try_from(payload.groups.len())
                    .map_err(|_| WireError::FieldTooLarge(payload.groups.len()))?;
                w.u16(s.max_threads)
                    .u16(s.current_threads)
                    .u16(s.local_jobs)
                    .u16(s.delegated_jobs)
                    .u16(s.remote_jobs)
                    .u16(group_count);
                w.str(&payload.peer_name)?;
                for (name, key) in &payload.groups {
                    w.str(name)?.bytes(key)?;
                }
            }
            Packet::NetworkResourcesAvailable(resources) => write_resources(&mut w, resources)?,
            Packet::QueryGroupNetworkResources { group_keys } => {
                let count = u16::try_from(group_keys.len())
                    .map_err(|_| WireError::FieldTooLarge(group_keys.len()))?;
                w.u16(count);
                for key in group_keys {
                    w.bytes(key)?;
                }
            }
            Packet::GroupNetworkResourcesAvailable { proof, resources } => {
                w.bytes(&proof.group_key)?
                    .bytes(&proof.signed_text)?
                    .bytes(&proof.signature)?;
                write_resources(&mut w, resources)?;
            }
            Packet::JobRequest { id }
            | Packet::JobRequestAccepted { id }
            | Packet::JobDataReceived { id }
            | Packet::AbortJob { id } => {
                w.u32(id.0);
            }
            Packet::JobRequestRejected { id } => {
                if let Some(id) = id {
                    w.u32(id.0);
                }
            }
            Packet::JobData(data) => {
                w.u32(data.id.0);
                w.str(&data.toolchain)?
                    .str(&data.language)?
                    .str_list(&data.parameters)?;
                w.bool(data.compressed);
                w.bytes_list(&data.files)?;
            }
            Packet::JobFinished(finished) => {
                w.u32(finished.id.0);
                w.bool(finished.outcome.is_some());
                if let Some(result) = &finished.outcome {
                    w.i32(result.return_code);
                    w.bytes(&result.stdout)?
                        .bytes(&result.stderr)?
                        .bytes_list(&result.files)?;
                }
            }
        }
        Ok(w.finish())
    }

    // =========================================================================
    // DECODE
    // =========================================================================

    pub fn decode(frame: &[u8], limits: &WireLimits) -> Result<Packet, WireError> {
        let (&tag, payload) = frame.split_first().ok_or(WireError::Empty)?;
        let packet_type = PacketType::try_from(tag)?;
        let mut r = PacketReader::new(packet_type, payload);

        let packet = match packet_type {
            PacketType::QueryNodeStatus => Packet::QueryNodeStatus,
            PacketType::NodeStatus => Packet::NodeStatus(read_node_status(&mut r)?),
            PacketType::QueryNetworkResources => Packet::QueryNetworkResources,
            PacketType::NetworkResourcesAvailable => {
                Packet::NetworkResourcesAvailable(read_resources(&mut r)?)
            }
            PacketType::QueryGroupNetworkResources => {
                let count = usize::from(r.u16()?);
                let mut group_keys = Vec::new();
                for _ in 0..count.min(limits.max_group_query_keys) {
                    group_keys.push(r.bytes()?);
                }
                Packet::QueryGroupNetworkResources { group_keys }
            }
            PacketType::GroupNetworkResourcesAvailable => {
                let proof = MembershipProof {
                    group_key: r.bytes()?,
                    signed_text: r.bytes()?,
                    signature: r.bytes()?,
                };
                Packet::GroupNetworkResourcesAvailable {
                    proof,
                    resources: read_resources(&mut r)?,
                }
            }
            PacketType::JobRequest => Packet::JobRequest { id: read_id(&mut r)? },
            PacketType::JobRequestAccepted => Packet::JobRequestAccepted { id: read_id(&mut r)? },
            PacketType::JobRequestRejected => {
                let id = if r.is_empty() {
                    None
                } else {
                    Some(read_id(&mut r)?)
                };
                Packet::JobRequestRejected { id }
            }
            PacketType::JobData => Packet::JobData(JobDataPayload {
                id: read_id(&mut r)?,
                toolchain: r.str()?,
                language: r.str()?,
                parameters: r.str_list()?,
                compressed: r.bool()?,
                files: r.bytes_list()?,
            }),
            PacketType::JobDataReceived => Packet::JobDataReceived { id: read_id(&mut r)? },
            PacketType::JobFinished => {
                let id = read_id(&mut r)?;
                let outcome = if r.bool()? {
                    Some(RemoteResult {
                        return_code: r.i32()?,
                        stdout: r.bytes()?,
                        stderr: r.bytes()?,
                        files: r.bytes_list()?,
                    })
                } else {
                    None
                };
                Packet::JobFinished(JobFinishedPayload { id, outcome })
            }
            PacketType::AbortJob => Packet::AbortJob { id: read_id(&mut r)? },
        };
        Ok(packet)
    }
}

fn write_resources(w: &mut PacketWriter, resources: &Resources) -> Result<(), WireError> {
    w.u32(resources.slots);
    w.str_list(&resources.toolchains)?;
    Ok(())
}

fn read_resources(r: &mut PacketReader<'_>) -> Result<Resources, WireError> {
    Ok(Resources {
        slots: r.u32()?,
        toolchains: r.str_list()?,
    })
}

fn read_id(r: &mut PacketReader<'_>) -> Result<RequestId, WireError> {
    Ok(RequestId(r.u32()?))
}

fn read_node_status(r: &mut PacketReader<'_>) -> Result<NodeStatusPayload, WireError> {
    let status = NodeStatus {
        max_threads: r.u16()?,
        current_threads: r.u16()?,
        local_jobs: r.u16()?,
        delegated_jobs: r.u16()?,
        remote_jobs: r.u16()?,
    };
    let group_count = r.u16()?;
    let peer_name = r.str()?;

    let mut groups = Vec::new();
    for _ in 0..group_count {
        match (r.str(), r.bytes()) {
            (Ok(name), Ok(key)) => groups.push((name, key)),
            _ => break,
        }
    }

    Ok(NodeStatusPayload {
        status,
        peer_name,
        groups,
    })
}
