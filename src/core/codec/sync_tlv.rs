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

//! Sync-request TLV codec (spec §4.1, §4.3): the Bloom-sketch payload
//! carried by a `RequestSync` packet.

use thiserror::Error;

const TYPE_M_BYTES: u8 = 0x01;
const TYPE_K: u8 = 0x02;
const TYPE_BITS: u8 = 0x03;

/// Sync TLV codec errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyncTlvError {
    /// Truncated stream or a length that runs off the buffer.
    #[error("malformed sync TLV")]
    Malformed,
    /// `bits` length didn't match the declared `mBytes`.
    #[error("bits length does not match declared byte count")]
    LengthMismatch,
    /// Stream ended without a `bits` TLV.
    #[error("missing bits field")]
    MissingBits,
}

/// A decoded Bloom-sketch sync request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    /// Number of hash functions used to build the sketch.
    pub k: u8,
    /// Bloom filter bit array, `m_bytes` bytes long.
    pub bits: Vec<u8>,
}

impl SyncRequest {
    /// Encode as a TLV stream: every field is `type(1) | length(2 BE) | value`,
    /// including the fixed-width `mBytes` and `k` fields (spec §4.1, §6).
    pub fn encode(&self) -> Vec<u8> {
        let m_bytes = self.bits.len() as u16;
        let mut out = Vec::with_capacity(3 + 2 + 3 + 1 + 3 + self.bits.len());

        out.push(TYPE_M_BYTES);
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&m_bytes.to_be_bytes());

        out.push(TYPE_K);
        out.extend_from_slice(&1u16.to_be_bytes());
        out.push(self.k);

        out.push(TYPE_BITS);
        out.extend_from_slice(&m_bytes.to_be_bytes());
        out.extend_from_slice(&self.bits);

        out
    }

    /// Decode a TLV stream. Every TLV, known or not, is `type(1) | length(2 BE)
    /// | value`; unknown types are skipped by consuming the declared length.
    pub fn decode(buf: &[u8]) -> Result<Self, SyncTlvError> {
        let mut m_bytes: Option<u16> = None;
        let mut k: Option<u8> = None;
        let mut bits: Option<Vec<u8>> = None;

        let mut pos = 0usize;
        while pos < buf.len() {
            let ty = buf[pos];
            pos += 1;
            let len = read_u16(buf, &mut pos)? as usize;

            match ty {
                TYPE_M_BYTES => {
                    let value = read_n(buf, &mut pos, len)?;
                    if len != 2 {
                        return Err(SyncTlvError::Malformed);
                    }
                    m_bytes = Some(u16::from_be_bytes([value[0], value[1]]));
                }
                TYPE_K => {
                    let value = read_n(buf, &mut pos, len)?;
                    if len != 1 {
                        return Err(SyncTlvError::Malformed);
                    }
                    k = Some(value[0]);
                }
                TYPE_BITS => {
                    bits = Some(read_n(buf, &mut pos, len)?.to_vec());
                }
                _ => {
                    let _ = read_n(buf, &mut pos, len)?;
                }
            }
        }

        let bits = bits.ok_or(SyncTlvError::MissingBits)?;
        if let Some(declared) = m_bytes {
            if declared as usize != bits.len() {
                return Err(SyncTlvError::LengthMismatch);
            }
        }

        Ok(SyncRequest {
            k: k.unwrap_or(0),
            bits,
        })
    }
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16, SyncTlvError> {
    let b = read_n(buf, pos, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_n<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], SyncTlvError> {
    if *pos + n > buf.len() {
        return Err(SyncTlvError::Malformed);
    }
    let out = &buf[*pos..*pos + n];
    *pos += n;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let req = SyncRequest {
            k: 4,
            bits: vec![0xAA; 32],
        };
        let bytes = req.encode();
        let decoded = SyncRequest::decode(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn encode_matches_type_length_value_framing() {
        let req = SyncRequest { k: 4, bits: vec![0xAA, 0xBB] };
        let bytes = req.encode();
        let mut expected = Vec::new();
        expected.push(TYPE_M_BYTES);
        expected.extend_from_slice(&2u16.to_be_bytes());
        expected.extend_from_slice(&2u16.to_be_bytes());
        expected.push(TYPE_K);
        expected.extend_from_slice(&1u16.to_be_bytes());
        expected.push(4);
        expected.push(TYPE_BITS);
        expected.extend_from_slice(&2u16.to_be_bytes());
        expected.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn skips_unknown_tlvs() {
        let mut buf = Vec::new();
        buf.push(0xEE);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.push(TYPE_K);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(3);
        buf.push(TYPE_BITS);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[1, 2]);

        let decoded = SyncRequest::decode(&buf).unwrap();
        assert_eq!(decoded.k, 3);
        assert_eq!(decoded.bits, vec![1, 2]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut buf = Vec::new();
        buf.push(TYPE_M_BYTES);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&5u16.to_be_bytes());
        buf.push(TYPE_BITS);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[1, 2]);
        assert_eq!(SyncRequest::decode(&buf).unwrap_err(), SyncTlvError::LengthMismatch);
    }

    #[test]
    fn rejects_missing_bits() {
        let mut buf = Vec::new();
        buf.push(TYPE_K);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(3);
        assert_eq!(SyncRequest::decode(&buf).unwrap_err(), SyncTlvError::MissingBits);
    }

    #[test]
    fn rejects_truncated_stream() {
        let buf = vec![TYPE_BITS, 0x00];
        assert_eq!(SyncRequest::decode(&buf).unwrap_err(), SyncTlvError::Malformed);
    }

    #[test]
    fn rejects_wrong_length_for_fixed_width_field() {
        let mut buf = Vec::new();
        buf.push(TYPE_K);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&[3, 0]);
        buf.push(TYPE_BITS);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(0xAA);
        assert_eq!(SyncRequest::decode(&buf).unwrap_err(), SyncTlvError::Malformed);
    }
}
