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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Dual-transport peer-to-peer chat messaging core.
//!
//! This crate provides:
//! - Binary wire codecs for packets, file transfers, sync sketches,
//!   verification handshakes, and overlay events
//! - A rotating Bloom filter and gossip sync manager for mesh anti-entropy
//! - A mesh transport interface and an overlay transport reached only
//!   through an embedded, fail-closed anonymizing proxy
//! - A proof-of-work miner for overlay public events
//! - A message router with a per-peer outbox for deferred delivery
//! - Monitoring via Prometheus metrics and structured logging

/// Core protocol primitives (identity, crypto seams, codecs, bloom,
/// gossip, mesh/overlay transports, PoW, router, and the ambient
/// config/error/persistence/scheduling stack).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
