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

//! Gossip sync manager: Bloom-filter anti-entropy over recently seen
//! broadcast and announce packets (spec §4.3).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex as AsyncMutex;

use crate::core::bloom::RotatingBloomFilter;
use crate::core::codec::packet::{Packet, PacketKind};
use crate::core::codec::sync_tlv::SyncRequest;
use crate::core::identity::PeerId;
use crate::core::mesh::MeshEvent;
use crate::core::scheduler::TaskScheduler;

/// Delay between a peer first appearing and the one-time unicast
/// `REQUEST_SYNC` addressed to them, in addition to the periodic broadcast
/// cadence (spec §4.3: "an additional scheduled sync to a specific peer …
/// emitted 5 s after that peer first appears").
pub const PEER_SYNC_DELAY: Duration = Duration::from_secs(5);

/// Bounds and cadence for the gossip sync manager (spec §4.3, §6).
#[derive(Clone, Copy, Debug)]
pub struct GossipParams {
    /// Max broadcasts retained in the FIFO replay window.
    pub message_cap: usize,
    /// `REQUEST_SYNC` emission period, seconds.
    pub period_seconds: u64,
}

/// Tracks recently observed public packets for anti-entropy sync serving.
///
/// Owned by the single-threaded main context (spec §5); only the internal
/// Bloom filter is independently mutex-guarded so it can also be queried
/// from elsewhere without borrowing the whole manager.
pub struct GossipSyncManager {
    seen: RotatingBloomFilter,
    messages: VecDeque<Packet>,
    latest_announcement: HashMap<[u8; 8], Packet>,
    params: GossipParams,
}

impl GossipSyncManager {
    /// Build a manager with its own Bloom filter sized per `bloom_max_bytes`
    /// / `bloom_target_fpr` (spec §4.2).
    pub fn new(bloom_max_bytes: u16, bloom_target_fpr: f64, params: GossipParams) -> Self {
        Self {
            seen: RotatingBloomFilter::new(bloom_max_bytes, bloom_target_fpr),
            messages: VecDeque::new(),
            latest_announcement: HashMap::new(),
            params,
        }
    }

    /// Record a publicly observed packet. Only `BroadcastMessage` and
    /// `Announce` kinds are retained; anything else is ignored.
    pub fn on_public_packet_seen(&mut self, packet: &Packet) {
        match packet.kind {
            PacketKind::BroadcastMessage => {
                self.seen.insert(&packet.fingerprint());
                self.messages.push_back(packet.clone());
                while self.messages.len() > self.params.message_cap {
                    self.messages.pop_front();
                }
            }
            PacketKind::Announce => {
                self.seen.insert(&packet.fingerprint());
                self.latest_announcement.insert(packet.sender_id, packet.clone());
            }
            _ => {}
        }
    }

    /// Build the periodic `REQUEST_SYNC` packet carrying this node's active
    /// Bloom snapshot. `ttl` is fixed at 0 (local-only, spec §4.3).
    pub fn build_request_sync_packet(&self, sender_id: [u8; 8], timestamp_ms: u64) -> Packet {
        let snap = self.seen.snapshot();
        let req = SyncRequest {
            k: snap.k,
            bits: snap.bits,
        };
        Packet {
            kind: PacketKind::RequestSync,
            ttl: 0,
            timestamp_ms,
            sender_id,
            recipient_id: None,
            payload: req.encode(),
            signature: None,
        }
    }

    /// Serve a `REQUEST_SYNC` request: return every announcement, then every
    /// retained broadcast in insertion order, that the requester's Bloom
    /// snapshot does not already account for. Each returned packet has
    /// `ttl` zeroed (unicast, never re-flooded).
    pub fn serve_request_sync(&self, req: &SyncRequest) -> Vec<Packet> {
        let snapshot = crate::core::bloom::BloomSnapshot {
            m_bytes: req.bits.len() as u16,
            k: req.k,
            bits: req.bits.clone(),
        };

        let mut out = Vec::new();

        for packet in self.latest_announcement.values() {
            if !snapshot.might_contain(&packet.fingerprint()) {
                out.push(zero_ttl(packet));
            }
        }

        for packet in &self.messages {
            if !snapshot.might_contain(&packet.fingerprint()) {
                out.push(zero_ttl(packet));
            }
        }

        out
    }

    /// Cadence this manager should be polled on by the task scheduler.
    pub fn period_seconds(&self) -> u64 {
        self.params.period_seconds
    }

    /// Build a one-time unicast `REQUEST_SYNC` addressed to `recipient_id`,
    /// otherwise identical to [`Self::build_request_sync_packet`]. This is
    /// the packet [`schedule_peer_sync`] sends 5 s after `recipient_id`
    /// first appears.
    pub fn build_peer_sync_packet(&self, sender_id: [u8; 8], recipient_id: [u8; 8], timestamp_ms: u64) -> Packet {
        let snap = self.seen.snapshot();
        let req = SyncRequest {
            k: snap.k,
            bits: snap.bits,
        };
        Packet {
            kind: PacketKind::RequestSync,
            ttl: 0,
            timestamp_ms,
            sender_id,
            recipient_id: Some(recipient_id),
            payload: req.encode(),
            signature: None,
        }
    }
}

fn zero_ttl(packet: &Packet) -> Packet {
    let mut clone = packet.clone();
    clone.ttl = 0;
    clone
}

/// Task name a peer's scheduled sync is registered under, so a peer that
/// disappears and reappears before the delay elapses replaces its own
/// pending sync rather than colliding with another peer's.
pub fn peer_sync_task_name(peer_short_id: &[u8; 8]) -> String {
    format!("peer-sync-{}", hex::encode(peer_short_id))
}

fn short_id_of(peer: &PeerId) -> Option<[u8; 8]> {
    match peer {
        PeerId::Short(id) => Some(*id),
        PeerId::Full(id) => {
            let mut short = [0u8; 8];
            short.copy_from_slice(&id[..8]);
            Some(short)
        }
        PeerId::Overlay(_) => None,
    }
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// React to a mesh event: a `PeerAppeared` schedules the spec §4.3 one-time
/// unicast sync to that peer `PEER_SYNC_DELAY` from now; every other event
/// is ignored. `send` receives the addressed packet once the delay elapses
/// and should hand it to the mesh transport.
///
/// Overlay-namespaced peer ids never reach the mesh transport and are
/// ignored here too.
pub fn schedule_peer_sync<S>(
    gossip: Arc<AsyncMutex<GossipSyncManager>>,
    scheduler: &TaskScheduler,
    sender_id: [u8; 8],
    event: &MeshEvent,
    send: S,
) where
    S: FnOnce(Packet) + Send + 'static,
{
    let MeshEvent::PeerAppeared(peer) = event else {
        return;
    };
    let Some(recipient_id) = short_id_of(peer) else {
        return;
    };

    let task_name = peer_sync_task_name(&recipient_id);
    scheduler.spawn_named(&task_name, async move {
        tokio::time::sleep(PEER_SYNC_DELAY).await;
        let packet = {
            let mgr = gossip.lock().await;
            mgr.build_peer_sync_packet(sender_id, recipient_id, now_unix_ms())
        };
        send(packet);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast(sender: u8, payload: &[u8], ts: u64) -> Packet {
        Packet {
            kind: PacketKind::BroadcastMessage,
            ttl: 7,
            timestamp_ms: ts,
            sender_id: [sender; 8],
            recipient_id: None,
            payload: payload.to_vec(),
            signature: None,
        }
    }

    fn announce(sender: u8, ts: u64) -> Packet {
        Packet {
            kind: PacketKind::Announce,
            ttl: 7,
            timestamp_ms: ts,
            sender_id: [sender; 8],
            recipient_id: None,
            payload: vec![],
            signature: None,
        }
    }

    fn manager() -> GossipSyncManager {
        GossipSyncManager::new(
            256,
            0.01,
            GossipParams {
                message_cap: 100,
                period_seconds: 30,
            },
        )
    }

    #[test]
    fn broadcasts_evicted_on_overflow() {
        let mut mgr = GossipSyncManager::new(
            256,
            0.01,
            GossipParams {
                message_cap: 3,
                period_seconds: 30,
            },
        );
        for i in 0..5u8 {
            mgr.on_public_packet_seen(&broadcast(i, b"x", i as u64));
        }
        assert_eq!(mgr.messages.len(), 3);
        assert_eq!(mgr.messages.front().unwrap().sender_id, [2u8; 8]);
    }

    #[test]
    fn announces_overwrite_sender_slot() {
        let mut mgr = manager();
        mgr.on_public_packet_seen(&announce(1, 100));
        mgr.on_public_packet_seen(&announce(1, 200));
        assert_eq!(mgr.latest_announcement.len(), 1);
        assert_eq!(mgr.latest_announcement[&[1u8; 8]].timestamp_ms, 200);
    }

    #[test]
    fn serve_request_sync_skips_known_and_returns_ttl_zero() {
        let mut mgr = manager();
        let a = broadcast(1, b"a", 1);
        let b = broadcast(2, b"b", 2);
        mgr.on_public_packet_seen(&a);
        mgr.on_public_packet_seen(&b);

        // An empty peer snapshot (all-zero bits) knows nothing, so both
        // messages should be returned with ttl=0.
        let empty_req = SyncRequest { k: 3, bits: vec![0u8; 256] };
        let served = mgr.serve_request_sync(&empty_req);
        assert_eq!(served.len(), 2);
        assert!(served.iter().all(|p| p.ttl == 0));
    }

    #[test]
    fn serve_request_sync_withholds_already_known() {
        let mut mgr = manager();
        let a = broadcast(1, b"a", 1);
        mgr.on_public_packet_seen(&a);

        // A peer that has already seen everything we have: build their
        // snapshot from a filter fed the same fingerprint.
        let peer_filter = RotatingBloomFilter::new(256, 0.01);
        peer_filter.insert(&a.fingerprint());
        let snap = peer_filter.snapshot();
        let req = SyncRequest { k: snap.k, bits: snap.bits };

        let served = mgr.serve_request_sync(&req);
        assert!(served.is_empty());
    }

    #[test]
    fn request_sync_packet_has_ttl_zero_and_no_recipient() {
        let mgr = manager();
        let pkt = mgr.build_request_sync_packet([9u8; 8], 42);
        assert_eq!(pkt.kind, PacketKind::RequestSync);
        assert_eq!(pkt.ttl, 0);
        assert!(pkt.recipient_id.is_none());
    }

    #[test]
    fn peer_sync_packet_is_addressed_and_ttl_zero() {
        let mgr = manager();
        let pkt = mgr.build_peer_sync_packet([9u8; 8], [1u8; 8], 42);
        assert_eq!(pkt.kind, PacketKind::RequestSync);
        assert_eq!(pkt.ttl, 0);
        assert_eq!(pkt.recipient_id, Some([1u8; 8]));
    }

    #[tokio::test(start_paused = true)]
    async fn peer_appeared_schedules_unicast_sync_after_delay() {
        let gossip = Arc::new(AsyncMutex::new(manager()));
        let scheduler = TaskScheduler::new();
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));

        let peer = PeerId::Short([7u8; 8]);
        let sent_for_closure = sent.clone();
        schedule_peer_sync(gossip.clone(), &scheduler, [9u8; 8], &MeshEvent::PeerAppeared(peer), move |packet| {
            sent_for_closure.lock().unwrap().push(packet);
        });

        assert!(scheduler.is_running(&peer_sync_task_name(&[7u8; 8])));
        assert!(sent.lock().unwrap().is_empty());

        tokio::time::advance(PEER_SYNC_DELAY + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, Some([7u8; 8]));
        assert_eq!(sent[0].sender_id, [9u8; 8]);
    }

    #[test]
    fn non_peer_appeared_events_are_ignored() {
        let gossip = Arc::new(AsyncMutex::new(manager()));
        let scheduler = TaskScheduler::new();
        let event = MeshEvent::PeerDisappeared(PeerId::Short([7u8; 8]));
        schedule_peer_sync(gossip, &scheduler, [9u8; 8], &event, |_| {
            panic!("must not schedule a send for a non-appearance event");
        });
        assert!(!scheduler.is_running(&peer_sync_task_name(&[7u8; 8])));
    }

    #[test]
    fn overlay_peer_ids_never_reach_the_mesh_scheduler() {
        let gossip = Arc::new(AsyncMutex::new(manager()));
        let scheduler = TaskScheduler::new();
        let event = MeshEvent::PeerAppeared(PeerId::Overlay("npub1abc".to_string()));
        schedule_peer_sync(gossip, &scheduler, [9u8; 8], &event, |_| {
            panic!("an overlay peer id has no mesh short id to address a packet to");
        });
    }
}
