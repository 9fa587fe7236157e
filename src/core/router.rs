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

//! Message router + outbox (spec §4.7): picks a transport per outgoing
//! message, queues when neither is available, and flushes on
//! connectivity/mapping changes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::core::error::CoreError;
use crate::core::identity::PeerId;
use crate::core::mesh::MeshTransport;

/// A receipt's delivery status. Ordered `Sending < Sent < Delivered < Read`
/// (spec §4.7, §8): updates only ever move forward along this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeliveryStatus {
    /// Submitted to a transport, outcome unknown.
    Sending,
    /// Transport accepted the send.
    Sent,
    /// Recipient's client acknowledged delivery.
    Delivered,
    /// Recipient has read the message.
    Read,
}

impl DeliveryStatus {
    /// Apply a status update, ignoring attempts that would move backward.
    pub fn advance(self, requested: DeliveryStatus) -> DeliveryStatus {
        if requested > self {
            requested
        } else {
            self
        }
    }
}

/// A receipt kind sent over whichever transport is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptKind {
    /// Delivery acknowledgement.
    Delivered,
    /// Read receipt.
    Read,
}

/// Queries mutual-favorite mappings. Opaque to the router: it only reads
/// mappings, never writes them (spec §6 persisted-state layout).
pub trait FavoritesStore: Send + Sync {
    /// The overlay pubkey for `peer`, if a mutual-favorite mapping with a
    /// non-null overlay pubkey exists.
    fn overlay_mapping(&self, peer: &PeerId) -> Option<String>;
}

/// Sends over the overlay transport, gated internally by proxy readiness.
/// Kept as a router-facing seam distinct from [`crate::core::overlay::transport::OverlayTransport`]
/// so the router never has to construct the signed event itself.
pub trait OverlaySender: Send + Sync {
    /// Send a direct message to `recipient_overlay_pubkey`.
    fn send_private(&self, content: &str, recipient_overlay_pubkey: &str, message_id: &str) -> Result<(), CoreError>;
    /// Send a delivery/read receipt to `recipient_overlay_pubkey`.
    fn send_receipt(&self, kind: ReceiptKind, message_id: &str, recipient_overlay_pubkey: &str) -> Result<(), CoreError>;
    /// Send a public post to a geohash channel (mined per spec §4.6).
    fn send_public(&self, content: &str, geohash: &str) -> Result<(), CoreError>;
}

/// Notification the router subscribes to (spec §9 design note: prefer a
/// typed event channel over the source's notification-bus pattern).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FavoriteStatusChanged {
    /// The affected peer.
    pub peer: PeerId,
    /// The new overlay mapping, or `None` if the mutual-favorite link was
    /// broken.
    pub mapping: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct OutboxEntry {
    content: String,
    nickname: String,
    message_id: String,
}

/// Per-peer FIFO queue of sends that could not be dispatched immediately.
#[derive(Default)]
pub struct Outbox {
    by_peer: Mutex<HashMap<PeerId, VecDeque<OutboxEntry>>>,
}

impl Outbox {
    fn new() -> Self {
        Self::default()
    }

    fn push(&self, peer: &PeerId, entry: OutboxEntry) {
        let mut map = self.by_peer.lock().expect("outbox mutex poisoned");
        map.entry(peer.clone()).or_default().push_back(entry);
    }

    /// Number of entries currently queued for `peer`.
    pub fn depth_for(&self, peer: &PeerId) -> usize {
        self.by_peer
            .lock()
            .expect("outbox mutex poisoned")
            .get(peer)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Total entries queued across all peers (used for a gauge metric).
    pub fn total_depth(&self) -> usize {
        self.by_peer.lock().expect("outbox mutex poisoned").values().map(VecDeque::len).sum()
    }
}

/// Chooses a transport per outgoing message and queues in the [`Outbox`]
/// when neither mesh nor overlay can carry it right now.
pub struct MessageRouter<M: MeshTransport, O: OverlaySender, F: FavoritesStore> {
    mesh: Arc<M>,
    overlay: Arc<O>,
    favorites: Arc<F>,
    outbox: Outbox,
}

impl<M: MeshTransport, O: OverlaySender, F: FavoritesStore> MessageRouter<M, O, F> {
    /// Build a router over the given transport/favorites collaborators.
    pub fn new(mesh: Arc<M>, overlay: Arc<O>, favorites: Arc<F>) -> Self {
        Self {
            mesh,
            overlay,
            favorites,
            outbox: Outbox::new(),
        }
    }

    /// Current outbox, for depth metrics and tests.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Send a private message to `peer`, following the decision table in
    /// spec §4.7: mesh if reachable, else overlay if mapped, else enqueue.
    pub fn send_private(&self, content: &str, peer: &PeerId, nickname: &str, message_id: &str) {
        if self.mesh.is_peer_reachable(peer) {
            let _ = self.mesh.send_private_message(content, peer, nickname, message_id);
            return;
        }

        if let Some(pubkey) = self.favorites.overlay_mapping(peer) {
            if self.overlay.send_private(content, &pubkey, message_id).is_ok() {
                return;
            }
        }

        self.outbox.push(
            peer,
            OutboxEntry {
                content: content.to_string(),
                nickname: nickname.to_string(),
                message_id: message_id.to_string(),
            },
        );
    }

    /// Send a delivery/read receipt, preferring mesh when reachable
    /// (cheaper, faster), otherwise overlay.
    pub fn send_receipt(&self, kind: ReceiptKind, peer: &PeerId, message_id: &str) -> Result<(), CoreError> {
        if self.mesh.is_peer_reachable(peer) {
            return match kind {
                ReceiptKind::Delivered => self.mesh.send_delivery_ack(message_id, peer),
                ReceiptKind::Read => self.mesh.send_read_receipt(message_id, peer),
            };
        }
        match self.favorites.overlay_mapping(peer) {
            Some(pubkey) => self.overlay.send_receipt(kind, message_id, &pubkey),
            None => Err(CoreError::TransportUnavailable),
        }
    }

    /// Public send with no specific recipient: unconditionally over mesh,
    /// and over overlay (with PoW) in `geohash`'s channel.
    pub fn send_public(&self, content: &str, nickname: &str, message_id: &str, geohash: &str) {
        let _ = self.mesh.send_broadcast_message(content, nickname, message_id);
        let _ = self.overlay.send_public(content, geohash);
    }

    /// Re-run the decision table for every queued entry for `peer`;
    /// entries that still can't be sent are kept in place, in order.
    pub fn flush_for_peer(&self, peer: &PeerId) {
        let pending = {
            let mut map = self.outbox.by_peer.lock().expect("outbox mutex poisoned");
            map.remove(peer).unwrap_or_default()
        };

        let mut remaining = VecDeque::new();
        for entry in pending {
            let sent = if self.mesh.is_peer_reachable(peer) {
                self.mesh
                    .send_private_message(&entry.content, peer, &entry.nickname, &entry.message_id)
                    .is_ok()
            } else if let Some(pubkey) = self.favorites.overlay_mapping(peer) {
                self.overlay.send_private(&entry.content, &pubkey, &entry.message_id).is_ok()
            } else {
                false
            };

            if !sent {
                remaining.push_back(entry);
            }
        }

        if !remaining.is_empty() {
            let mut map = self.outbox.by_peer.lock().expect("outbox mutex poisoned");
            map.insert(peer.clone(), remaining);
        }
    }

    /// React to a favorite-mapping change by flushing the affected peer's
    /// outbox slice.
    pub fn on_favorite_status_changed(&self, event: &FavoriteStatusChanged) {
        self.flush_for_peer(&event.peer);
    }

    /// React to a mesh-reachability transition by flushing the affected
    /// peer's outbox slice.
    pub fn on_mesh_reachability_changed(&self, peer: &PeerId) {
        self.flush_for_peer(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mesh::test_support::FakeMeshTransport;
    use std::sync::Mutex as StdMutex;

    struct FakeOverlaySender {
        allow: bool,
        sent_private: StdMutex<Vec<(String, String, String)>>,
    }

    impl FakeOverlaySender {
        fn new(allow: bool) -> Self {
            Self {
                allow,
                sent_private: StdMutex::new(Vec::new()),
            }
        }
    }

    impl OverlaySender for FakeOverlaySender {
        fn send_private(&self, content: &str, recipient_overlay_pubkey: &str, message_id: &str) -> Result<(), CoreError> {
            if !self.allow {
                return Err(CoreError::ProxyNotReady);
            }
            self.sent_private.lock().unwrap().push((
                content.to_string(),
                recipient_overlay_pubkey.to_string(),
                message_id.to_string(),
            ));
            Ok(())
        }

        fn send_receipt(&self, _kind: ReceiptKind, _message_id: &str, _recipient_overlay_pubkey: &str) -> Result<(), CoreError> {
            if self.allow {
                Ok(())
            } else {
                Err(CoreError::ProxyNotReady)
            }
        }

        fn send_public(&self, _content: &str, _geohash: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct FakeFavoritesStore {
        mapping: StdMutex<HashMap<PeerId, Option<String>>>,
    }

    impl FakeFavoritesStore {
        fn new() -> Self {
            Self { mapping: StdMutex::new(HashMap::new()) }
        }

        fn set_mapping(&self, peer: PeerId, pubkey: Option<String>) {
            self.mapping.lock().unwrap().insert(peer, pubkey);
        }
    }

    impl FavoritesStore for FakeFavoritesStore {
        fn overlay_mapping(&self, peer: &PeerId) -> Option<String> {
            self.mapping.lock().unwrap().get(peer).cloned().flatten()
        }
    }

    fn peer(n: u8) -> PeerId {
        PeerId::Full([n; 32])
    }

    #[test]
    fn unreachable_unmapped_peer_enqueues_outbox() {
        // Scenario 4 setup (spec §8).
        let mesh = Arc::new(FakeMeshTransport::new(PeerId::Full([0; 32])));
        let overlay = Arc::new(FakeOverlaySender::new(false));
        let favorites = Arc::new(FakeFavoritesStore::new());
        let router = MessageRouter::new(mesh, overlay, favorites);

        let p = peer(1);
        router.send_private("hi", &p, "nick", "mid-1");
        assert_eq!(router.outbox().depth_for(&p), 1);
    }

    #[test]
    fn favorite_status_changed_flushes_outbox_over_overlay() {
        // Scenario 4 (spec §8): outbox flush on FavoriteStatusChanged.
        let mesh = Arc::new(FakeMeshTransport::new(PeerId::Full([0; 32])));
        let overlay = Arc::new(FakeOverlaySender::new(true));
        let favorites = Arc::new(FakeFavoritesStore::new());
        let router = MessageRouter::new(mesh, overlay.clone(), favorites.clone());

        let p = peer(1);
        router.send_private("hi", &p, "nick", "mid-1");
        assert_eq!(router.outbox().depth_for(&p), 1);

        favorites.set_mapping(p.clone(), Some("overlay-pk".to_string()));
        router.on_favorite_status_changed(&FavoriteStatusChanged {
            peer: p.clone(),
            mapping: Some("overlay-pk".to_string()),
        });

        assert_eq!(router.outbox().depth_for(&p), 0);
        let sent = overlay.sent_private.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("hi".to_string(), "overlay-pk".to_string(), "mid-1".to_string()));
    }

    #[test]
    fn mesh_reachable_peer_never_touches_outbox() {
        let mesh = Arc::new(FakeMeshTransport::new(PeerId::Full([0; 32])));
        let p = peer(2);
        mesh.reachable.lock().unwrap().push(p.clone());
        let overlay = Arc::new(FakeOverlaySender::new(false));
        let favorites = Arc::new(FakeFavoritesStore::new());
        let router = MessageRouter::new(mesh, overlay, favorites);

        router.send_private("hi", &p, "nick", "mid-2");
        assert_eq!(router.outbox().depth_for(&p), 0);
    }

    #[test]
    fn delivery_status_never_moves_backward() {
        let mut status = DeliveryStatus::Sending;
        status = status.advance(DeliveryStatus::Sent);
        status = status.advance(DeliveryStatus::Read);
        assert_eq!(status, DeliveryStatus::Read);
        status = status.advance(DeliveryStatus::Delivered);
        assert_eq!(status, DeliveryStatus::Read);
    }

    #[test]
    fn ordering_matches_sending_sent_delivered_read() {
        assert!(DeliveryStatus::Sending < DeliveryStatus::Sent);
        assert!(DeliveryStatus::Sent < DeliveryStatus::Delivered);
        assert!(DeliveryStatus::Delivered < DeliveryStatus::Read);
    }
}
