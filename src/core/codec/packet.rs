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

//! Packet wire codec (spec §4.1).
//!
//! Layout (all multi-byte integers big-endian):
//! `kind(1) | flags(1) | ttl(1) | timestamp(8) | senderId(8) |
//!  [recipientId(8) if flag set] | payloadLen(2) | payload | [sigLen(1) | sig]`

use thiserror::Error;

const FLAG_HAS_RECIPIENT: u8 = 0b0000_0001;
const FLAG_HAS_SIGNATURE: u8 = 0b0000_0010;

/// Packet codec errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketCodecError {
    /// Buffer ended before a fixed-size field could be read.
    #[error("truncated packet")]
    Truncated,
    /// A declared length field pointed past the end of the buffer.
    #[error("length out of range")]
    LengthOutOfRange,
}

/// Registry of packet kinds referenced by this spec. Unknown wire values
/// round-trip through [`PacketKind::Other`] so forward-compatible peers
/// don't choke on a kind they don't recognize yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketKind {
    /// Chat message flooded with no specific recipient.
    BroadcastMessage,
    /// Peer presence + identity announcement.
    Announce,
    /// Direct message to a specific recipient.
    PrivateMessage,
    /// Read receipt for a specific message id.
    ReadReceipt,
    /// Delivery acknowledgement for a specific message id.
    DeliveryAck,
    /// Mutual-favorite status notification.
    FavoriteNotification,
    /// File-transfer TLV payload (broadcast or directed).
    FileTransfer,
    /// Bloom-sketch anti-entropy request (spec §4.3).
    RequestSync,
    /// Verification handshake challenge/response (spec §4.1).
    Verification,
    /// Any wire kind this build doesn't have a name for yet.
    Other(u8),
}

impl PacketKind {
    fn to_u8(self) -> u8 {
        match self {
            PacketKind::BroadcastMessage => 0x01,
            PacketKind::Announce => 0x02,
            PacketKind::PrivateMessage => 0x03,
            PacketKind::ReadReceipt => 0x04,
            PacketKind::DeliveryAck => 0x05,
            PacketKind::FavoriteNotification => 0x06,
            PacketKind::FileTransfer => 0x07,
            PacketKind::RequestSync => 0x08,
            PacketKind::Verification => 0x09,
            PacketKind::Other(b) => b,
        }
    }

    fn from_u8(b: u8) -> Self {
        match b {
            0x01 => PacketKind::BroadcastMessage,
            0x02 => PacketKind::Announce,
            0x03 => PacketKind::PrivateMessage,
            0x04 => PacketKind::ReadReceipt,
            0x05 => PacketKind::DeliveryAck,
            0x06 => PacketKind::FavoriteNotification,
            0x07 => PacketKind::FileTransfer,
            0x08 => PacketKind::RequestSync,
            0x09 => PacketKind::Verification,
            other => PacketKind::Other(other),
        }
    }
}

/// A decoded (or about-to-be-encoded) mesh packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Packet kind.
    pub kind: PacketKind,
    /// Flood time-to-live; decremented by each forwarding hop.
    pub ttl: u8,
    /// Sender wall-clock timestamp, milliseconds since Unix epoch.
    pub timestamp_ms: u64,
    /// 8-byte sender short routing id.
    pub sender_id: [u8; 8],
    /// 8-byte recipient short routing id; `None` means broadcast.
    pub recipient_id: Option<[u8; 8]>,
    /// Opaque payload bytes (interpretation depends on `kind`).
    pub payload: Vec<u8>,
    /// Optional detached signature over the packet's signable bytes.
    pub signature: Option<Vec<u8>>,
}

impl Packet {
    /// Encode to the wire layout described in spec §4.1.
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.recipient_id.is_some() {
            flags |= FLAG_HAS_RECIPIENT;
        }
        if self.signature.is_some() {
            flags |= FLAG_HAS_SIGNATURE;
        }

        let mut out = Vec::with_capacity(1 + 1 + 1 + 8 + 8 + 8 + 2 + self.payload.len() + 1 + 64);
        out.push(self.kind.to_u8());
        out.push(flags);
        out.push(self.ttl);
        out.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        out.extend_from_slice(&self.sender_id);
        if let Some(r) = self.recipient_id {
            out.extend_from_slice(&r);
        }
        let payload_len = self.payload.len().min(u16::MAX as usize) as u16;
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(&self.payload[..payload_len as usize]);
        if let Some(sig) = &self.signature {
            let sig_len = sig.len().min(u8::MAX as usize) as u8;
            out.push(sig_len);
            out.extend_from_slice(&sig[..sig_len as usize]);
        }
        out
    }

    /// Decode from the wire layout described in spec §4.1.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketCodecError> {
        let mut cursor = Cursor::new(buf);
        let kind = PacketKind::from_u8(cursor.take_u8()?);
        let flags = cursor.take_u8()?;
        let ttl = cursor.take_u8()?;
        let timestamp_ms = cursor.take_u64()?;
        let sender_id = cursor.take_8()?;

        let recipient_id = if flags & FLAG_HAS_RECIPIENT != 0 {
            Some(cursor.take_8()?)
        } else {
            None
        };

        let payload_len = cursor.take_u16()? as usize;
        let payload = cursor.take_n(payload_len)?.to_vec();

        let signature = if flags & FLAG_HAS_SIGNATURE != 0 {
            let sig_len = cursor.take_u8()? as usize;
            Some(cursor.take_n(sig_len)?.to_vec())
        } else {
            None
        };

        Ok(Packet {
            kind,
            ttl,
            timestamp_ms,
            sender_id,
            recipient_id,
            payload,
            signature,
        })
    }

    /// 16-byte packet fingerprint, derived from every field except `ttl`
    /// and `signature` (spec §3.1: same (sender, kind, payload, timestamp)
    /// implies the same fingerprint — the value two peers need to agree on
    /// for anti-entropy dedup regardless of hop count or re-signing).
    pub fn fingerprint(&self) -> [u8; 16] {
        let mut buf = Vec::with_capacity(1 + 8 + 8 + 8 + self.payload.len());
        buf.push(self.kind.to_u8());
        buf.extend_from_slice(&self.sender_id);
        if let Some(r) = self.recipient_id {
            buf.push(1);
            buf.extend_from_slice(&r);
        } else {
            buf.push(0);
        }
        buf.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        buf.extend_from_slice(&self.payload);

        let digest = ring::digest::digest(&ring::digest::SHA256, &buf);
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest.as_ref()[..16]);
        out
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take_n(&mut self, n: usize) -> Result<&'a [u8], PacketCodecError> {
        if self.pos + n > self.buf.len() {
            return Err(PacketCodecError::LengthOutOfRange);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_u8(&mut self) -> Result<u8, PacketCodecError> {
        Ok(self.take_n(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, PacketCodecError> {
        let b = self.take_n(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u64(&mut self) -> Result<u64, PacketCodecError> {
        let b = self.take_n(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    fn take_8(&mut self) -> Result<[u8; 8], PacketCodecError> {
        let b = self.take_n(8)?;
        Ok(b.try_into().unwrap())
    }
}

impl From<PacketCodecError> for crate::core::error::CoreError {
    fn from(_: PacketCodecError) -> Self {
        crate::core::error::CoreError::MalformedPacket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload: Vec<u8>) -> Packet {
        Packet {
            kind: PacketKind::BroadcastMessage,
            ttl: 7,
            timestamp_ms: 1_700_000_000_000,
            sender_id: [1, 2, 3, 4, 5, 6, 7, 8],
            recipient_id: None,
            payload,
            signature: None,
        }
    }

    #[test]
    fn round_trips_broadcast() {
        let p = sample(b"hello".to_vec());
        let bytes = p.encode();
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn round_trips_private_with_recipient_and_signature() {
        let mut p = sample(b"secret".to_vec());
        p.kind = PacketKind::PrivateMessage;
        p.recipient_id = Some([9, 9, 9, 9, 9, 9, 9, 9]);
        p.signature = Some(vec![0xAB; 64]);
        let bytes = p.encode();
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(p, decoded);
    }

    #[test]
    fn round_trips_every_known_kind() {
        let kinds = [
            PacketKind::BroadcastMessage,
            PacketKind::Announce,
            PacketKind::PrivateMessage,
            PacketKind::ReadReceipt,
            PacketKind::DeliveryAck,
            PacketKind::FavoriteNotification,
            PacketKind::FileTransfer,
            PacketKind::RequestSync,
            PacketKind::Verification,
            PacketKind::Other(0xEE),
        ];
        for kind in kinds {
            let mut p = sample(vec![1, 2, 3]);
            p.kind = kind;
            let bytes = p.encode();
            let decoded = Packet::decode(&bytes).unwrap();
            assert_eq!(p, decoded);
        }
    }

    #[test]
    fn decode_fails_on_truncation() {
        let p = sample(b"hello".to_vec());
        let bytes = p.encode();
        for cut in 0..bytes.len() {
            assert!(Packet::decode(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn fingerprint_ignores_ttl_and_signature() {
        let mut a = sample(b"x".to_vec());
        let mut b = a.clone();
        b.ttl = 1;
        b.signature = Some(vec![0u8; 64]);
        assert_eq!(a.fingerprint(), b.fingerprint());

        a.payload = b"y".to_vec();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let p = sample(b"same fields".to_vec());
        assert_eq!(p.fingerprint(), p.fingerprint());
    }
}
