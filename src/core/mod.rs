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

//! Core protocol primitives: identity, crypto seams, wire codecs, the
//! rotating Bloom filter, gossip sync, mesh/overlay transports, the
//! proof-of-work miner, the message router, and the ambient config/error/
//! persistence/scheduling stack they share.

/// Rotating Bloom filter for mesh anti-entropy membership checks.
pub mod bloom;
/// Binary wire codecs.
pub mod codec;
/// TOML-backed configuration surface.
pub mod config;
/// Opaque signing/verification seams.
pub mod crypto;
/// Crate-wide error taxonomy.
pub mod error;
/// Gossip/anti-entropy sync manager.
pub mod gossip;
/// Peer identity normalization.
pub mod identity;
/// Mesh transport interface.
pub mod mesh;
/// Overlay transport and its fail-closed proxy gate.
pub mod overlay;
/// Atomic-write-backed persisted state.
pub mod persistence;
/// Proof-of-work miner for overlay public events.
pub mod pow;
/// Mesh/overlay message router and outbox.
pub mod router;
/// Named long-lived background task registry.
pub mod scheduler;
