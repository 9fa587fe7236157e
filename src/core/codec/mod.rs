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

//! Binary wire codecs (spec §4.1): the packet envelope and its TLV-encoded
//! payload variants.

/// File-transfer TLV codec.
pub mod file_tlv;
/// Overlay public-event canonical serialization.
pub mod overlay_event;
/// Packet envelope codec.
pub mod packet;
/// Bloom-sketch sync-request TLV codec.
pub mod sync_tlv;
/// Verification-handshake TLV codec.
pub mod verification_tlv;

pub use file_tlv::{FilePacket, FileTlvError};
pub use overlay_event::{OverlayEvent, OverlayEventError};
pub use packet::{Packet, PacketCodecError, PacketKind};
pub use sync_tlv::{SyncRequest, SyncTlvError};
pub use verification_tlv::{VerificationMessage, VerificationTlvError};
