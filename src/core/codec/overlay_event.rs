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

//! Overlay public event model (spec §3, §4.5): a Nostr-shaped signed event
//! used for public posts relayed over the overlay transport. The event id
//! is the SHA-256 digest of the canonical JSON array
//! `[0, pubkeyHex, createdAt, kind, tags, content]`, serialized with no
//! inserted whitespace and no escaped forward slashes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Overlay event errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OverlayEventError {
    /// The event's `id` did not match the recomputed canonical digest.
    #[error("event id mismatch")]
    IdMismatch,
    /// `pubkey` or `id` was not valid lowercase hex of the expected length.
    #[error("invalid hex field")]
    InvalidHex,
    /// Canonicalization failed (should not happen for well-formed tags).
    #[error("canonicalization failed")]
    Canonicalize,
}

/// A signed overlay event, shaped after the Nostr event model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayEvent {
    /// Lowercase hex SHA-256 of the canonical serialization.
    pub id: String,
    /// Lowercase hex Ed25519 (Schnorr in real Nostr, Ed25519 here) public key.
    pub pubkey: String,
    /// Unix timestamp, seconds.
    pub created_at: u64,
    /// Event kind (1 = public chat post, per spec §3).
    pub kind: u32,
    /// Tag arrays, e.g. `["g", "<geohash>"]`.
    pub tags: Vec<Vec<String>>,
    /// Event content.
    pub content: String,
    /// Lowercase hex detached signature over `id`.
    pub sig: String,
}

impl OverlayEvent {
    /// Compute the canonical id for the given fields, independent of any
    /// already-populated `id`/`sig` on a constructed event.
    pub fn compute_id(
        pubkey: &str,
        created_at: u64,
        kind: u32,
        tags: &[Vec<String>],
        content: &str,
    ) -> Result<String, OverlayEventError> {
        let tags_value: Vec<Value> = tags
            .iter()
            .map(|tag| Value::Array(tag.iter().map(|s| Value::String(s.clone())).collect()))
            .collect();

        let array = Value::Array(vec![
            Value::from(0),
            Value::String(pubkey.to_string()),
            Value::from(created_at),
            Value::from(kind),
            Value::Array(tags_value),
            Value::String(content.to_string()),
        ]);

        let canonical = serde_json::to_string(&array).map_err(|_| OverlayEventError::Canonicalize)?;
        let digest = ring::digest::digest(&ring::digest::SHA256, canonical.as_bytes());
        Ok(hex::encode(digest.as_ref()))
    }

    /// Verify that `id` matches the recomputed canonical digest for this
    /// event's fields. Does not check the signature; callers verify that
    /// separately against a [`crate::core::crypto::Verifier`].
    pub fn verify_id(&self) -> Result<(), OverlayEventError> {
        let expected = Self::compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if expected != self.id {
            return Err(OverlayEventError::IdMismatch);
        }
        Ok(())
    }

    /// Bytes signed by `sig`: the raw 32-byte id digest, decoded from hex.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, OverlayEventError> {
        hex::decode(&self.id).map_err(|_| OverlayEventError::InvalidHex)
    }

    /// First geohash tag value, if any (spec §4.5 relay selection keys off
    /// this tag).
    pub fn geohash(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(|t| t == "g").unwrap_or(false))
            .and_then(|tag| tag.get(1))
            .map(|s| s.as_str())
    }
}
