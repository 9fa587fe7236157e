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

//! Rotating Bloom filter (spec §4.2): bounded-memory approximate membership
//! over recent packet fingerprints, used by the gossip sync manager for
//! anti-entropy. All operations are total — there is no failure model here.

use std::sync::Mutex;

const LN2: f64 = std::f64::consts::LN_2;

fn bit_indices(fp: &[u8], m_bits: usize, k: u32) -> Vec<usize> {
    let h1 = fnv1a(fp, 0xcbf2_9ce4_8422_2325, 0x0000_0100_0000_01b3);
    let h2 = fnv1a(fp, 0x9e37_79b9_7f4a_7c15, 0x0000_0100_0000_01b3u64.wrapping_mul(31));

    (0..k as u64)
        .map(|i| {
            let combined = h1.wrapping_add(i.wrapping_mul(h2)) & 0x7fff_ffff_ffff_ffff;
            (combined % m_bits as u64) as usize
        })
        .collect()
}

fn fnv1a(data: &[u8], offset_basis: u64, prime: u64) -> u64 {
    let mut hash = offset_basis;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(prime);
    }
    hash
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FilterState {
    bytes: Vec<u8>,
}

impl FilterState {
    fn empty(m_bytes: usize) -> Self {
        Self {
            bytes: vec![0u8; m_bytes],
        }
    }

    fn set(&mut self, bit_index: usize) {
        let byte = bit_index / 8;
        let bit_in_byte = bit_index % 8;
        self.bytes[byte] |= 0x80 >> bit_in_byte;
    }

    fn get(&self, bit_index: usize) -> bool {
        let byte = bit_index / 8;
        let bit_in_byte = bit_index % 8;
        self.bytes[byte] & (0x80 >> bit_in_byte) != 0
    }
}

struct Inner {
    m_bits: usize,
    m_bytes: usize,
    k: u32,
    capacity: usize,
    active: FilterState,
    standby: Option<FilterState>,
    insert_count: usize,
}

/// A point-in-time, wire-shippable copy of the active filter's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BloomSnapshot {
    /// Filter size in bytes.
    pub m_bytes: u16,
    /// Hash-function count.
    pub k: u8,
    /// Bit array, MSB-first within each byte.
    pub bits: Vec<u8>,
}

impl BloomSnapshot {
    /// Reconstruct the membership predicate from a received snapshot
    /// (spec §4.3: used to serve `REQUEST_SYNC` against a peer's bits).
    pub fn might_contain(&self, fingerprint: &[u8]) -> bool {
        let m_bits = self.bits.len() * 8;
        if m_bits == 0 {
            return false;
        }
        bit_indices(fingerprint, m_bits, self.k as u32)
            .into_iter()
            .all(|i| {
                let byte = i / 8;
                let bit_in_byte = i % 8;
                self.bits[byte] & (0x80 >> bit_in_byte) != 0
            })
    }
}

/// Rotating Bloom filter guarded by a single internal mutex (spec §4.2,
/// §5 shared-resource policy).
pub struct RotatingBloomFilter {
    inner: Mutex<Inner>,
}

impl RotatingBloomFilter {
    /// Build a filter for `max_bytes` of storage targeting `target_fpr`.
    /// Derives capacity `n` and hash count `k` per spec §4.2.
    pub fn new(max_bytes: u16, target_fpr: f64) -> Self {
        let m_bytes = max_bytes as usize;
        let m_bits = m_bytes * 8;
        let n = (-(m_bits as f64) * LN2 * LN2 / target_fpr.ln()).floor();
        let capacity = (n as i64).max(1) as usize;
        let k = ((m_bits as f64 / capacity as f64) * LN2).ceil();
        let k = (k as i64).max(1) as u32;

        Self {
            inner: Mutex::new(Inner {
                m_bits,
                m_bytes,
                k,
                capacity,
                active: FilterState::empty(m_bytes),
                standby: None,
                insert_count: 0,
            }),
        }
    }

    /// Insert a fingerprint, rotating the active/standby filters per the
    /// spec §4.2 schedule.
    pub fn insert(&self, fingerprint: &[u8]) {
        let mut inner = self.inner.lock().expect("bloom filter mutex poisoned");
        inner.insert_count += 1;

        if inner.standby.is_none() && inner.insert_count == inner.capacity / 2 {
            inner.standby = Some(FilterState::empty(inner.m_bytes));
        }

        let bits = bit_indices(fingerprint, inner.m_bits, inner.k);
        for i in bits {
            inner.active.set(i);
            if let Some(standby) = inner.standby.as_mut() {
                standby.set(i);
            }
        }

        if inner.insert_count == inner.capacity {
            let rotated = inner
                .standby
                .take()
                .unwrap_or_else(|| FilterState::empty(inner.m_bytes));
            inner.active = rotated;
            inner.insert_count = 0;
        }
    }

    /// True if `fingerprint` may have been inserted. Never a false
    /// negative for anything actually inserted into this filter instance;
    /// may be a false positive with probability bounded by the configured
    /// target FPR.
    pub fn might_contain(&self, fingerprint: &[u8]) -> bool {
        let inner = self.inner.lock().expect("bloom filter mutex poisoned");
        let bits = bit_indices(fingerprint, inner.m_bits, inner.k);
        let active_hit = bits.iter().all(|&i| inner.active.get(i));
        if active_hit {
            return true;
        }
        match &inner.standby {
            Some(standby) => bits.iter().all(|&i| standby.get(i)),
            None => false,
        }
    }

    /// Snapshot the active filter for transmission in a `RequestSync` TLV.
    pub fn snapshot(&self) -> BloomSnapshot {
        let inner = self.inner.lock().expect("bloom filter mutex poisoned");
        BloomSnapshot {
            m_bytes: inner.m_bytes as u16,
            k: inner.k as u8,
            bits: inner.active.bytes.clone(),
        }
    }
}
