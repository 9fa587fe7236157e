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

#![forbid(unsafe_code)]

use proptest::prelude::*;

use bitmesh_core::core::codec::{Packet, PacketKind};

proptest! {
    #[test]
    fn packet_round_trips_for_any_broadcast_payload(
        ttl in 0u8..=32,
        timestamp_ms in any::<u64>(),
        sender_id in any::<[u8; 8]>(),
        payload in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let packet = Packet {
            kind: PacketKind::BroadcastMessage,
            ttl,
            timestamp_ms,
            sender_id,
            recipient_id: None,
            payload,
            signature: None,
        };
        let decoded = Packet::decode(&packet.encode()).expect("decode");
        prop_assert_eq!(decoded, packet);
    }

    #[test]
    fn packet_round_trips_with_recipient_and_signature(
        ttl in 0u8..=32,
        timestamp_ms in any::<u64>(),
        sender_id in any::<[u8; 8]>(),
        recipient_id in any::<[u8; 8]>(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
        sig in proptest::collection::vec(any::<u8>(), 1..32),
    ) {
        let packet = Packet {
            kind: PacketKind::PrivateMessage,
            ttl,
            timestamp_ms,
            sender_id,
            recipient_id: Some(recipient_id),
            payload,
            signature: Some(sig),
        };
        let decoded = Packet::decode(&packet.encode()).expect("decode");
        prop_assert_eq!(decoded, packet);
    }
}

#[test]
fn unknown_kind_round_trips_through_other() {
    let packet = Packet {
        kind: PacketKind::Other(0x7f),
        ttl: 3,
        timestamp_ms: 1,
        sender_id: [1; 8],
        recipient_id: None,
        payload: vec![9, 9, 9],
        signature: None,
    };
    let decoded = Packet::decode(&packet.encode()).unwrap();
    assert_eq!(decoded.kind, PacketKind::Other(0x7f));
}
