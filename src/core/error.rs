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

//! Crate-wide error taxonomy (spec §7).
//!
//! Each leaf component defines its own narrow error enum (`PacketCodecError`,
//! `FileTlvError`, ...) and converts into [`CoreError`] at the point where the
//! result crosses into router/gossip/overlay logic that needs to decide
//! whether an error is locally recovered or propagated to the caller.

use thiserror::Error;

/// Top-level error taxonomy shared by the router, gossip manager and overlay
/// transport. Decode/signature errors are logged at `debug` and dropped by
/// the caller; everything else propagates per the table in spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Truncated or structurally invalid wire data. Locally recovered: drop
    /// and continue. Never user-visible.
    #[error("malformed packet")]
    MalformedPacket,
    /// A signature did not verify. Locally recovered: drop. Never
    /// user-visible.
    #[error("invalid signature")]
    SignatureInvalid,
    /// A payload exceeded a size ceiling. Rejected at ingress; surfaced to
    /// the caller at send time.
    #[error("payload too large")]
    PayloadTooLarge,
    /// The overlay proxy gate denied a send because the proxy is not
    /// bootstrapped. Always surfaced to a user-initiated caller.
    #[error("proxy not ready")]
    ProxyNotReady,
    /// Bootstrap polling exceeded its deadline; the proxy moved to `Failed`.
    #[error("proxy bootstrap timed out")]
    ProxyBootstrapTimeout,
    /// Neither transport could carry the message right now; it was queued
    /// in the outbox instead.
    #[error("transport unavailable, queued")]
    TransportUnavailable,
    /// The packet fingerprint was already seen; silently dropped.
    #[error("duplicate packet")]
    Duplicate,
    /// A sender or content rate bucket rejected the message.
    #[error("rate limited")]
    RateLimited,
    /// The caller must resolve an ambiguous decode (e.g. conflicting TLV
    /// interpretations); this is not auto-recovered.
    #[error("decode ambiguity")]
    DecodeAmbiguity,
    /// A radio or relay I/O operation failed; the caller should retry with
    /// backoff.
    #[error("transport io error: {0}")]
    IoError(String),
}

impl CoreError {
    /// True for errors that spec §7 says are locally recovered without ever
    /// surfacing to a user.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            CoreError::MalformedPacket
                | CoreError::SignatureInvalid
                | CoreError::Duplicate
                | CoreError::RateLimited
        )
    }
}
