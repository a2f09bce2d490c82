//! Packet entry point: decode, then route by packet type.

use shared_types::PeerId;
use tracing::{debug, trace, warn};

use super::core::JobExchangeService;
use crate::domain::JobExchangeError;
use crate::ports::{CompilerExecutor, FileStore, JobEventSink, Transport};
use crate::wire::{Packet, PacketType, WireError};

impl<T, C, F, E> JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    pub(crate) fn on_packet(&mut self, peer: PeerId, frame: &[u8]) -> Result<(), JobExchangeError> {
        if !self.peers.contains_key(&peer) {
            debug!(%peer, "Packet from unknown peer dropped");
            return Ok(());
        }

        let packet = match Packet::decode(frame, &self.limits) {
            Ok(packet) => packet,
            Err(WireError::Malformed {
                packet_type: PacketType::JobRequest,
                ..
            }) => {
                debug!(%peer, "Malformed job request rejected");
                self.send(peer, &Packet::JobRequestRejected { id: None });
                return Ok(());
            }
            Err(WireError::UnknownTag(tag)) => {
                warn!(%peer, tag, "Unknown packet type dropped");
                return Ok(());
            }
            Err(error) => {
                debug!(%peer, %error, "Malformed packet dropped");
                return Ok(());
            }
        };
        trace!(%peer, packet_type = ?packet.packet_type(), size = frame.len(), "Packet received");

        match packet {
            Packet::QueryNodeStatus => self.report_node_status(peer),
            Packet::NodeStatus(status) => self.on_node_status(peer, status),
            Packet::QueryNetworkResources => self.report_network_resources(peer),
            Packet::NetworkResourcesAvailable(resources) => {
                self.on_network_resources(peer, resources)?
            }
            Packet::QueryGroupNetworkResources { group_keys } => {
                self.on_group_resource_query(peer, &group_keys)
            }
            Packet::GroupNetworkResourcesAvailable { proof, resources } => {
                self.on_group_network_resources(peer, &proof, resources)?
            }
            Packet::JobRequest { id } => self.on_job_request(peer, id),
            Packet::JobRequestAccepted { id } => self.on_job_request_accepted(peer, id)?,
            Packet::JobRequestRejected { id } => self.on_job_request_rejected(peer, id)?,
            Packet::JobData(data) => self.on_job_data(peer, data)?,
            Packet::JobDataReceived { id } => self.on_job_data_received(peer, id),
            Packet::JobFinished(finished) => self.on_job_finished(peer, finished)?,
            Packet::AbortJob { id } => self.on_abort_job(peer, id),
        }
        Ok(())
    }
}
