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

//! Peer identity normalization (spec §3.1, §4.3, §9 design note).
//!
//! The source this crate is modeled after lets `PeerId` be any lowercase
//! string and distinguishes kinds by length and content on every use. Per
//! the design note in spec §9 we instead parse once into a tagged variant
//! and push validation out of the hot path.

use std::fmt;
use thiserror::Error;

/// A short routing id: the 8-byte digest of a peer's static public key,
/// as 16 lowercase hex characters on the wire.
pub type ShortId = [u8; 8];
/// A full identity key: 32 raw bytes, 64 lowercase hex characters on the wire.
pub type FullId = [u8; 32];

/// Normalized peer identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeerId {
    /// 16-hex-char short routing id (8 bytes).
    Short(ShortId),
    /// 64-hex-char full identity key (32 bytes).
    Full(FullId),
    /// `overlay:`-namespaced identity (e.g. a Nostr-style pubkey string).
    Overlay(String),
}

/// Peer-id parse errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerIdError {
    /// Not 16 hex chars, not 64 hex chars, and not `overlay:`-prefixed.
    #[error("invalid peer id")]
    InvalidFormat,
    /// Contained non-hex characters where hex was required.
    #[error("invalid hex encoding")]
    InvalidHex,
}

impl PeerId {
    /// Parse a lowercase-normalized peer-id string into its tagged variant.
    ///
    /// Input is first lowercased; callers that need to reject mixed case
    /// should check that before calling this.
    pub fn parse(raw: &str) -> Result<Self, PeerIdError> {
        let s = raw.trim();
        if let Some(rest) = s.strip_prefix("overlay:") {
            if rest.is_empty() {
                return Err(PeerIdError::InvalidFormat);
            }
            return Ok(PeerId::Overlay(rest.to_ascii_lowercase()));
        }

        let lower = s.to_ascii_lowercase();
        match lower.len() {
            16 => {
                let bytes = hex::decode(&lower).map_err(|_| PeerIdError::InvalidHex)?;
                let mut out = [0u8; 8];
                out.copy_from_slice(&bytes);
                Ok(PeerId::Short(out))
            }
            64 => {
                let bytes = hex::decode(&lower).map_err(|_| PeerIdError::InvalidHex)?;
                let mut out = [0u8; 32];
                out.copy_from_slice(&bytes);
                Ok(PeerId::Full(out))
            }
            _ => Err(PeerIdError::InvalidFormat),
        }
    }

    /// Render back to the canonical lowercase wire form.
    pub fn to_wire_string(&self) -> String {
        match self {
            PeerId::Short(b) => hex::encode(b),
            PeerId::Full(b) => hex::encode(b),
            PeerId::Overlay(s) => format!("overlay:{s}"),
        }
    }

    /// True if this and `other` could plausibly name the same peer by
    /// sharing the same short-id prefix (a full key's routing id is its
    /// first 8 bytes). Used by the router when matching a favorite mapping
    /// recognized in either short or full form (spec §4.7).
    pub fn matches_short(&self, short: &ShortId) -> bool {
        match self {
            PeerId::Short(s) => s == short,
            PeerId::Full(f) => &f[..8] == short,
            PeerId::Overlay(_) => false,
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}
