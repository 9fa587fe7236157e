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

//! Proof-of-work miner for overlay public events (spec §4.6): fine-grained
//! geohash posts must carry an id with enough leading zero bits to deter
//! spam at the relay layer.

use thiserror::Error;

use crate::core::codec::overlay_event::{OverlayEvent, OverlayEventError};
use crate::core::config::PowConfig;

/// Iterations between cooperative yields while mining (spec §4.6 step 4).
const YIELD_EVERY: u64 = 16_384;

/// PoW mining errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PowError {
    /// Canonical event serialization failed.
    #[error("canonicalization failed")]
    Canonicalize,
}

impl From<OverlayEventError> for PowError {
    fn from(_: OverlayEventError) -> Self {
        PowError::Canonicalize
    }
}

const fn build_lz_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = (i as u8).leading_zeros();
        i += 1;
    }
    table
}

const LZ_TABLE: [u32; 256] = build_lz_table();

/// Count leading zero bits across `bytes`, short-circuiting at the first
/// nonzero byte (spec §4.6).
pub fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut total = 0u32;
    for &b in bytes {
        total += LZ_TABLE[b as usize];
        if b != 0 {
            break;
        }
    }
    total
}

/// Required leading-zero bits for a geohash of the given string length,
/// per the difficulty schedule in spec §4.6 / §6.
pub fn required_bits(geohash: &str, cfg: &PowConfig) -> u32 {
    match geohash.len() {
        0..=5 => cfg.bits_precision_le_5,
        6 => cfg.bits_precision_6,
        _ => cfg.bits_precision_ge_7,
    }
}

/// Mine a nonce such that the canonical event id has at least `target_bits`
/// leading zero bits. Appends a `["nonce", "<n>", "<targetBits>"]` tag to
/// `base_tags` on every attempt, mutating only that tag. Yields to the
/// async scheduler roughly every 16384 iterations since this is CPU-bound.
///
/// Returns `(nonce, idHex)`. Not cancellable by design (spec §5): callers
/// that need to abandon a mine should simply drop the future before it
/// resolves, losing no shared state, since no partial results are published.
pub async fn mine(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    base_tags: &[Vec<String>],
    content: &str,
    target_bits: u32,
    seed: u64,
) -> Result<(u64, String), PowError> {
    let mut n = seed;
    let mut since_yield = 0u64;

    loop {
        let mut tags = base_tags.to_vec();
        tags.push(vec!["nonce".to_string(), n.to_string(), target_bits.to_string()]);

        let id = OverlayEvent::compute_id(pubkey, created_at, kind, &tags, content)?;
        let id_bytes = hex::decode(&id).map_err(|_| PowError::Canonicalize)?;

        if leading_zero_bits(&id_bytes) >= target_bits {
            return Ok((n, id));
        }

        n = n.wrapping_add(1);
        since_yield += 1;
        if since_yield >= YIELD_EVERY {
            since_yield = 0;
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_bits_exactness() {
        // Scenario 2 (spec §8): [0x00, 0x00, 0xF0] ++ 29 zero bytes -> 16.
        let mut bytes = vec![0x00, 0x00, 0xF0];
        bytes.extend(std::iter::repeat(0x00).take(29));
        assert_eq!(leading_zero_bits(&bytes), 16);
    }

    #[test]
    fn leading_zero_bits_all_zero() {
        let bytes = [0u8; 32];
        assert_eq!(leading_zero_bits(&bytes), 32 * 8);
    }

    #[test]
    fn required_bits_matches_schedule() {
        let cfg = PowConfig::default();
        assert_eq!(required_bits("abcde", &cfg), 10);
        assert_eq!(required_bits("abcdef", &cfg), 9);
        assert_eq!(required_bits("abcdefg", &cfg), 8);
    }

    #[tokio::test]
    async fn pow_terminates_at_low_difficulty() {
        // Scenario 1 (spec §8).
        let pubkey = "a".repeat(64);
        let base_tags = vec![vec!["g".to_string(), "u4pruydqqvj".to_string()]];
        let (nonce, id) = mine(&pubkey, 1_700_000_000, 20000, &base_tags, "hello", 8, 1).await.unwrap();
        assert!(nonce >= 1);

        let mut tags = base_tags.clone();
        tags.push(vec!["nonce".to_string(), nonce.to_string(), "8".to_string()]);
        let recomputed = OverlayEvent::compute_id(&pubkey, 1_700_000_000, 20000, &tags, "hello").unwrap();
        assert_eq!(recomputed, id);
        let bytes = hex::decode(&id).unwrap();
        assert!(leading_zero_bits(&bytes) >= 8);
    }
}
