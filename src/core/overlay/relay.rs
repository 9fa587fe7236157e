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

//! Relay directory and geohash-proximity selection (spec §4.5.2).

use std::collections::HashSet;

const GEOHASH_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";
const EARTH_RADIUS_KM: f64 = 6371.0;
const EMBEDDED_RELAYS_CSV: &str = include_str!("relays.csv");

/// A relay with an approximate geographic location, used only for
/// proximity ranking (not cryptographic or routing identity).
#[derive(Clone, Debug, PartialEq)]
pub struct Relay {
    /// Relay hostname (no scheme).
    pub host: String,
    /// Approximate latitude, degrees.
    pub lat: f64,
    /// Approximate longitude, degrees.
    pub lon: f64,
}

/// Deduplicated set of known relays, loaded from an embedded CSV.
pub struct RelayDirectory {
    relays: Vec<Relay>,
}

impl RelayDirectory {
    /// Load the directory baked into this build.
    pub fn embedded() -> Self {
        Self::from_csv(EMBEDDED_RELAYS_CSV)
    }

    /// Parse a `host,lat,lon` CSV body (with header row), deduplicating by
    /// host — first occurrence wins.
    pub fn from_csv(data: &str) -> Self {
        let mut seen = HashSet::new();
        let mut relays = Vec::new();

        for line in data.lines().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, ',');
            let (Some(host), Some(lat), Some(lon)) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            if !seen.insert(host.to_string()) {
                continue;
            }
            let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
                continue;
            };
            relays.push(Relay {
                host: host.to_string(),
                lat,
                lon,
            });
        }

        Self { relays }
    }

    /// Select the `count` relays nearest the center of `geohash`, returned
    /// as `"wss://<host>"` URLs sorted nearest-first.
    pub fn nearest_for_geohash(&self, geohash: &str, count: usize) -> Vec<String> {
        let Some((lat, lon)) = decode_geohash(geohash) else {
            return Vec::new();
        };

        let mut ranked: Vec<(f64, &Relay)> = self
            .relays
            .iter()
            .map(|r| (haversine_km(lat, lon, r.lat, r.lon), r))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(count)
            .map(|(_, r)| format!("wss://{}", r.host))
            .collect()
    }
}

/// Decode a base-32 geohash to its bounding box's center `(lat, lon)`.
pub fn decode_geohash(geohash: &str) -> Option<(f64, f64)> {
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut even_bit = true;

    for c in geohash.chars() {
        let idx = GEOHASH_ALPHABET.iter().position(|&b| b == c as u8)?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            let range = if even_bit { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if bit == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even_bit = !even_bit;
        }
    }

    Some(((lat_range.0 + lat_range.1) / 2.0, (lon_range.0 + lon_range.1) / 2.0))
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1r = lat1.to_radians();
    let lat2r = lat2.to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_geohash_known_value() {
        // "u4pruydqqvj" decodes near Copenhagen (spec §8 scenario 1 uses
        // this exact geohash as a PoW fixture).
        let (lat, lon) = decode_geohash("u4pruydqqvj").unwrap();
        assert!((lat - 57.64).abs() < 0.1);
        assert!((lon - 10.41).abs() < 0.1);
    }

    #[test]
    fn decode_geohash_rejects_bad_alphabet() {
        assert!(decode_geohash("a!!").is_none());
    }

    #[test]
    fn directory_dedups_by_host() {
        let csv = "host,lat,lon\nr1,1.0,1.0\nr1,2.0,2.0\nr2,3.0,3.0\n";
        let dir = RelayDirectory::from_csv(csv);
        assert_eq!(dir.relays.len(), 2);
        assert_eq!(dir.relays[0].lat, 1.0);
    }

    #[test]
    fn embedded_directory_parses() {
        let dir = RelayDirectory::embedded();
        assert!(dir.relays.len() >= 5);
    }

    #[test]
    fn nearest_for_geohash_returns_sorted_wss_urls() {
        let dir = RelayDirectory::embedded();
        let nearest = dir.nearest_for_geohash("u4pruydqqvj", 3);
        assert_eq!(nearest.len(), 3);
        assert!(nearest.iter().all(|u| u.starts_with("wss://")));
    }

    #[test]
    fn nearest_for_geohash_invalid_geohash_is_empty() {
        let dir = RelayDirectory::embedded();
        assert!(dir.nearest_for_geohash("!!!", 5).is_empty());
    }
}
