// Copyright (c) 2026 Bitmesh
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mesh transport interface (spec §4.4): the capability set a BLE radio
//! driver exposes downward and the message router consumes. Sends are
//! non-blocking from the router's perspective — the driver queues
//! internally and reports outcomes asynchronously via [`MeshEvent`].

use crate::core::codec::packet::Packet;
use crate::core::error::CoreError;
use crate::core::identity::PeerId;

/// Events a mesh radio driver emits upward to the router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    /// A packet was decoded off the radio.
    PacketDecoded(Packet),
    /// A peer became reachable (directly or multi-hop).
    PeerAppeared(PeerId),
    /// A previously reachable peer dropped out of range.
    PeerDisappeared(PeerId),
    /// A noise handshake with a peer completed.
    HandshakeCompleted(PeerId),
}

/// Capability set exposed by a BLE mesh radio driver (spec §4.4).
///
/// Implementations own fragmentation/reassembly and handshake state; the
/// router only calls through this trait and consumes the event stream it
/// produces out-of-band.
pub trait MeshTransport: Send + Sync {
    /// This node's own peer id, stable for the process lifetime.
    fn my_peer_id(&self) -> PeerId;

    /// True if `peer` is reachable, directly or multi-hop, within the
    /// current flood horizon.
    fn is_peer_reachable(&self, peer: &PeerId) -> bool;

    /// True if `peer` has a direct link.
    fn is_peer_connected(&self, peer: &PeerId) -> bool;

    /// Flood a broadcast chat message with no specific recipient.
    fn send_broadcast_message(&self, content: &str, nickname: &str, message_id: &str) -> Result<(), CoreError>;

    /// Initiate a handshake if needed and queue a private message.
    fn send_private_message(
        &self,
        content: &str,
        to: &PeerId,
        nickname: &str,
        message_id: &str,
    ) -> Result<(), CoreError>;

    /// Queue a read receipt for `to`.
    fn send_read_receipt(&self, receipt: &str, to: &PeerId) -> Result<(), CoreError>;

    /// Queue a delivery ack for `to`.
    fn send_delivery_ack(&self, message_id: &str, to: &PeerId) -> Result<(), CoreError>;

    /// Queue a mutual-favorite status notification.
    fn send_favorite_notification(&self, to: &PeerId, is_favorite: bool) -> Result<(), CoreError>;

    /// Queue a file-transfer TLV payload. `recipient == None` broadcasts.
    fn send_file_transfer_tlv(
        &self,
        payload: &[u8],
        recipient: Option<&PeerId>,
        transfer_id: &str,
        message_id: &str,
    ) -> Result<(), CoreError>;

    /// Attach this node's signature to a packet about to be broadcast.
    fn sign_packet_for_broadcast(&self, packet: Packet) -> Packet;
}
