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

//! Overlay transport operations: public geohash posts, gift-wrapped direct
//! messages, and delivery/read ACKs, all gated by the proxy readiness flag
//! (spec §4.5.2).

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use crate::core::codec::overlay_event::OverlayEvent;
use crate::core::error::CoreError;
use crate::core::overlay::proxy::ProxyManager;
use crate::core::overlay::relay::RelayDirectory;

/// Bound on the recently-processed event id set (spec §4.5.2).
const PROCESSED_ID_CAP: usize = 2000;

/// Publishes events to relays. The concrete WebSocket client lives outside
/// this crate; this seam exists so the transport's gating and relay
/// selection logic can be exercised without real network I/O.
pub trait RelayClient: Send + Sync {
    /// Publish `event` to `relay_url`.
    fn publish(&self, relay_url: &str, event: &OverlayEvent) -> Result<(), CoreError>;
}

/// Overlay transport: relay selection, fail-closed gating, and inbound
/// event dedup.
pub struct OverlayTransport<C: RelayClient> {
    proxy: std::sync::Arc<ProxyManager>,
    relays: RelayDirectory,
    relay_count: usize,
    client: C,
    processed_ids: Mutex<ProcessedIds>,
}

struct ProcessedIds {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl ProcessedIds {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// Returns `true` if `id` was newly inserted (not previously seen).
    fn insert(&mut self, id: &str) -> bool {
        if !self.set.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > PROCESSED_ID_CAP {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }
}

impl<C: RelayClient> OverlayTransport<C> {
    /// Build a transport over `relays`, gated by `proxy`.
    pub fn new(proxy: std::sync::Arc<ProxyManager>, relays: RelayDirectory, relay_count: usize, client: C) -> Self {
        Self {
            proxy,
            relays,
            relay_count,
            client,
            processed_ids: Mutex::new(ProcessedIds::new()),
        }
    }

    /// Publish a public event (kind `textNote`) to the relay set selected
    /// by its geohash tag's proximity.
    pub fn send_public(&self, event: &OverlayEvent) -> Result<(), CoreError> {
        self.gate()?;
        let geohash = event.geohash().unwrap_or_default();
        let targets = self.relays.nearest_for_geohash(geohash, self.relay_count);
        for relay_url in &targets {
            self.client.publish(relay_url, event)?;
        }
        Ok(())
    }

    /// Publish a gift-wrapped direct message envelope to the nearest
    /// relays for the sender's own geohash presence, addressed by the
    /// wrapped event's recipient tag.
    pub fn send_direct(&self, event: &OverlayEvent, geohash: &str) -> Result<(), CoreError> {
        self.gate()?;
        let targets = self.relays.nearest_for_geohash(geohash, self.relay_count);
        for relay_url in &targets {
            self.client.publish(relay_url, event)?;
        }
        Ok(())
    }

    /// Publish a delivery/read ACK event.
    pub fn send_ack(&self, event: &OverlayEvent, geohash: &str) -> Result<(), CoreError> {
        self.send_direct(event, geohash)
    }

    /// Record an inbound event id, returning `true` if this is the first
    /// time it has been seen (i.e. it should be delivered upward) and
    /// `false` if it is a duplicate from an overlapping subscription.
    pub fn dedup_inbound(&self, event_id: &str) -> bool {
        self.processed_ids.lock().expect("processed-id mutex poisoned").insert(event_id)
    }

    fn gate(&self) -> Result<(), CoreError> {
        if self.proxy.network_permitted() {
            Ok(())
        } else {
            Err(CoreError::ProxyNotReady)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct SpyRelayClient {
        calls: AtomicUsize,
    }

    impl SpyRelayClient {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    impl RelayClient for SpyRelayClient {
        fn publish(&self, _relay_url: &str, _event: &OverlayEvent) -> Result<(), CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_event(geohash: &str) -> OverlayEvent {
        let tags = vec![vec!["g".to_string(), geohash.to_string()]];
        let id = OverlayEvent::compute_id("ab", 1, 1, &tags, "hi").unwrap();
        OverlayEvent {
            id,
            pubkey: "ab".to_string(),
            created_at: 1,
            kind: 1,
            tags,
            content: "hi".to_string(),
            sig: "00".repeat(64),
        }
    }

    #[test]
    fn fail_closed_blocks_public_send_and_spy_sees_no_calls() {
        // Scenario 5 (spec §8): networkPermitted == false denies the send
        // and no network I/O (here: no relay client call) is observed.
        let proxy = std::sync::Arc::new(ProxyManager::new(false));
        let client = SpyRelayClient::new();
        let transport = OverlayTransport::new(proxy, RelayDirectory::embedded(), 5, client);

        let result = transport.send_public(&sample_event("u4pruydqqvj"));
        assert_eq!(result.unwrap_err(), CoreError::ProxyNotReady);
        assert_eq!(transport.client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dev_clearnet_allows_send() {
        let proxy = std::sync::Arc::new(ProxyManager::new(true));
        let client = SpyRelayClient::new();
        let transport = OverlayTransport::new(proxy, RelayDirectory::embedded(), 3, client);

        transport.send_public(&sample_event("u4pruydqqvj")).unwrap();
        assert_eq!(transport.client.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dedup_inbound_rejects_repeat_ids() {
        let proxy = std::sync::Arc::new(ProxyManager::new(true));
        let transport = OverlayTransport::new(proxy, RelayDirectory::embedded(), 3, SpyRelayClient::new());

        assert!(transport.dedup_inbound("event-1"));
        assert!(!transport.dedup_inbound("event-1"));
        assert!(transport.dedup_inbound("event-2"));
    }
}
