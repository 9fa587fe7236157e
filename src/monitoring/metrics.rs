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

//! Prometheus metrics registry for the mesh/overlay stack.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// All counters/gauges this crate publishes, backed by a single registry.
pub struct Metrics {
    /// The registry these metrics are bound to; a host exposes this via
    /// its own `/metrics` HTTP surface.
    pub registry: Registry,

    /// Packets successfully decoded at ingress.
    pub packets_decoded: IntCounter,
    /// Packets dropped at ingress, labeled by the [`crate::core::error::CoreError`]
    /// variant name that caused the drop.
    pub packets_dropped: IntCounterVec,

    /// Bloom filter insertions.
    pub bloom_inserts: IntCounter,
    /// Bloom filter membership queries.
    pub bloom_queries: IntCounter,

    /// Completed gossip `REQUEST_SYNC` rounds emitted.
    pub gossip_rounds: IntCounter,
    /// Packets unicast in reply to a served `REQUEST_SYNC`.
    pub gossip_replies_sent: IntCounter,

    /// Total entries currently queued across all outbox peers.
    pub outbox_depth: IntGauge,

    /// Current proxy lifecycle state, encoded 0..=5 (Off..Failed) for the
    /// gauge; see [`crate::core::overlay::proxy::ProxyState`] ordering.
    pub proxy_state: IntGauge,

    /// Proof-of-work mining attempts (hash computations).
    pub pow_attempts: IntCounter,
    /// Proof-of-work mines that reached their target difficulty.
    pub pow_completions: IntCounter,

    /// Overlay sends accepted by the fail-closed gate.
    pub overlay_sends_accepted: IntCounter,
    /// Overlay sends denied by the fail-closed gate.
    pub overlay_sends_denied: IntCounter,
}

impl Metrics {
    /// Build and register every metric against a fresh [`Registry`].
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let packets_decoded = IntCounter::new("packets_decoded_total", "Packets successfully decoded at ingress")?;
        let packets_dropped = IntCounterVec::new(
            Opts::new("packets_dropped_total", "Packets dropped at ingress by reason"),
            &["reason"],
        )?;
        let bloom_inserts = IntCounter::new("bloom_inserts_total", "Bloom filter insertions")?;
        let bloom_queries = IntCounter::new("bloom_queries_total", "Bloom filter membership queries")?;
        let gossip_rounds = IntCounter::new("gossip_rounds_total", "Completed REQUEST_SYNC emission rounds")?;
        let gossip_replies_sent = IntCounter::new("gossip_replies_sent_total", "Packets unicast in reply to REQUEST_SYNC")?;
        let outbox_depth = IntGauge::new("outbox_depth", "Total entries queued across all outbox peers")?;
        let proxy_state = IntGauge::new("proxy_state", "Current proxy lifecycle state (0=Off..5=Failed)")?;
        let pow_attempts = IntCounter::new("pow_attempts_total", "Proof-of-work hash attempts")?;
        let pow_completions = IntCounter::new("pow_completions_total", "Proof-of-work mines reaching target difficulty")?;
        let overlay_sends_accepted = IntCounter::new("overlay_sends_accepted_total", "Overlay sends accepted by the fail-closed gate")?;
        let overlay_sends_denied = IntCounter::new("overlay_sends_denied_total", "Overlay sends denied by the fail-closed gate")?;

        registry.register(Box::new(packets_decoded.clone()))?;
        registry.register(Box::new(packets_dropped.clone()))?;
        registry.register(Box::new(bloom_inserts.clone()))?;
        registry.register(Box::new(bloom_queries.clone()))?;
        registry.register(Box::new(gossip_rounds.clone()))?;
        registry.register(Box::new(gossip_replies_sent.clone()))?;
        registry.register(Box::new(outbox_depth.clone()))?;
        registry.register(Box::new(proxy_state.clone()))?;
        registry.register(Box::new(pow_attempts.clone()))?;
        registry.register(Box::new(pow_completions.clone()))?;
        registry.register(Box::new(overlay_sends_accepted.clone()))?;
        registry.register(Box::new(overlay_sends_denied.clone()))?;

        Ok(Self {
            registry,
            packets_decoded,
            packets_dropped,
            bloom_inserts,
            bloom_queries,
            gossip_rounds,
            gossip_replies_sent,
            outbox_depth,
            proxy_state,
            pow_attempts,
            pow_completions,
            overlay_sends_accepted,
            overlay_sends_denied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_without_error() {
        let metrics = Metrics::new().unwrap();
        metrics.packets_decoded.inc();
        metrics.packets_dropped.with_label_values(&["MalformedPacket"]).inc();
        assert_eq!(metrics.packets_decoded.get(), 1);
        let families = metrics.registry.gather();
        assert!(!families.is_empty());
    }
}
