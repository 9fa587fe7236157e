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

//! Configuration surface (spec §6), loaded from TOML with every field
//! defaulted so a partial config file is valid. Mirrors the teacher's
//! `NodeConfig` pattern: one root struct, one sub-struct per component,
//! `#[serde(default)]` everywhere.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file from disk.
    #[error("read config")]
    Read,
    /// Could not parse the config file as TOML.
    #[error("parse config")]
    Parse,
}

/// Mesh transport tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeshConfig {
    /// Max payload bytes per radio fragment.
    pub fragment_size: u16,
    /// Initial flood TTL for broadcast/private packets.
    pub ttl_default: u8,
    /// Cap on concurrent fragment reassemblies (enforced by the radio driver).
    pub max_in_flight_assemblies: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            fragment_size: 469,
            ttl_default: 7,
            max_in_flight_assemblies: 128,
        }
    }
}

/// Outbox tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutboxConfig {
    /// Implicit cap per peer via the timeline cap upstream.
    pub cap_per_peer: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self { cap_per_peer: 1337 }
    }
}

/// Rotating Bloom filter tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BloomConfig {
    /// Size of the rotating filter in bytes.
    pub max_bytes: u16,
    /// Target false-positive rate used to derive capacity/hash-count.
    pub target_fpr: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256,
            target_fpr: 0.01,
        }
    }
}

/// Gossip/anti-entropy tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GossipConfig {
    /// REQUEST_SYNC cadence in seconds.
    pub period_seconds: u64,
    /// Bounded LRU capacity for broadcast messages.
    pub message_cap: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            period_seconds: 30,
            message_cap: 100,
        }
    }
}

/// Overlay transport + proxy gate tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Embedded proxy SOCKS host:port.
    pub socks_addr: String,
    /// Embedded proxy control-channel port.
    pub control_port: u16,
    /// Nearest-relay fan-out per geohash.
    pub relay_count_per_geohash: usize,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            socks_addr: "127.0.0.1:39050".to_string(),
            control_port: 39051,
            relay_count_per_geohash: 5,
        }
    }
}

/// Proof-of-work difficulty schedule, keyed by geohash precision.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PowConfig {
    /// Required leading-zero bits for geohash precision <= 5.
    pub bits_precision_le_5: u32,
    /// Required leading-zero bits for geohash precision == 6.
    pub bits_precision_6: u32,
    /// Required leading-zero bits for geohash precision >= 7.
    pub bits_precision_ge_7: u32,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            bits_precision_le_5: 10,
            bits_precision_6: 9,
            bits_precision_ge_7: 8,
        }
    }
}

/// Fail-closed network policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Enforce proxy readiness before any overlay I/O. Disabling this
    /// outside of the `dev-clearnet` feature is a programming error.
    pub fail_closed: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { fail_closed: true }
    }
}

/// Root configuration, matching the table in spec §6.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Mesh transport settings.
    pub mesh: MeshConfig,
    /// Outbox settings.
    pub outbox: OutboxConfig,
    /// Bloom filter settings.
    pub bloom: BloomConfig,
    /// Gossip settings.
    pub gossip: GossipConfig,
    /// Overlay settings.
    pub overlay: OverlayConfig,
    /// PoW difficulty schedule.
    pub pow: PowConfig,
    /// Fail-closed policy.
    pub policy: PolicyConfig,
}

impl Config {
    /// Load configuration from a TOML file on disk, falling back to
    /// per-field defaults for anything the file omits.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
        toml::from_str(&raw).map_err(|_| ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.mesh.fragment_size, 469);
        assert_eq!(cfg.mesh.ttl_default, 7);
        assert_eq!(cfg.mesh.max_in_flight_assemblies, 128);
        assert_eq!(cfg.outbox.cap_per_peer, 1337);
        assert_eq!(cfg.bloom.max_bytes, 256);
        assert_eq!(cfg.bloom.target_fpr, 0.01);
        assert_eq!(cfg.gossip.period_seconds, 30);
        assert_eq!(cfg.overlay.socks_addr, "127.0.0.1:39050");
        assert_eq!(cfg.overlay.control_port, 39051);
        assert_eq!(cfg.overlay.relay_count_per_geohash, 5);
        assert_eq!(cfg.pow.bits_precision_le_5, 10);
        assert_eq!(cfg.pow.bits_precision_6, 9);
        assert_eq!(cfg.pow.bits_precision_ge_7, 8);
        assert!(cfg.policy.fail_closed);
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let toml = "[gossip]\nperiod_seconds = 45\n";
        let cfg: Config = toml::from_str(toml).expect("parse");
        assert_eq!(cfg.gossip.period_seconds, 45);
        assert_eq!(cfg.gossip.message_cap, 100);
        assert_eq!(cfg.bloom.max_bytes, 256);
    }
}
