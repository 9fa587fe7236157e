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

//! Overlay transport: the relay-based message path reached only through
//! an embedded anonymizing SOCKS proxy (spec §4.5).

/// Proxy lifecycle state machine and fail-closed gate.
pub mod proxy;
/// Geohash decoding and nearest-relay selection.
pub mod relay;
/// Relay publish/dedup transport built on the proxy gate.
pub mod transport;

pub use proxy::{ProxyManager, ProxyState};
pub use relay::{Relay, RelayDirectory};
pub use transport::OverlayTransport;
