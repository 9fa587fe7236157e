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

//! Verification handshake TLV codec (spec §4.1): proves a peer controls
//! both its noise transport key and its long-term signing key by echoing a
//! fresh nonce back over a detached signature.

use thiserror::Error;

const TYPE_NOISE_KEY_FP: u8 = 0x01;
const TYPE_SIGNING_KEY_FP: u8 = 0x02;
const TYPE_NONCE: u8 = 0x03;
const TYPE_SIGNATURE: u8 = 0x04;

/// Absolute ceiling on an encoded verification TLV payload.
pub const MAX_PAYLOAD_BYTES: usize = 512;

const FINGERPRINT_LEN: usize = 32;
const NONCE_LEN: usize = 32;

/// Verification TLV codec errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTlvError {
    /// Truncated stream or a length that runs off the buffer.
    #[error("malformed verification TLV")]
    Malformed,
    /// A fixed-size field was the wrong length.
    #[error("invalid field length")]
    InvalidLength,
    /// A required field was missing.
    #[error("missing required field")]
    MissingField,
    /// Encoded payload would exceed the 512-byte ceiling.
    #[error("payload too large")]
    TooLarge,
}

/// A decoded verification challenge or response. The same shape serves
/// both roles: a challenge carries no `signature`, a response does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationMessage {
    /// Fingerprint of the peer's noise transport key.
    pub noise_key_fingerprint: [u8; FINGERPRINT_LEN],
    /// Fingerprint of the peer's long-term signing key.
    pub signing_key_fingerprint: [u8; FINGERPRINT_LEN],
    /// Fresh nonce to be echoed back signed.
    pub nonce: [u8; NONCE_LEN],
    /// Detached signature over the nonce, present on a response.
    pub signature: Option<Vec<u8>>,
}

impl VerificationMessage {
    /// Encode as a TLV stream.
    pub fn encode(&self) -> Result<Vec<u8>, VerificationTlvError> {
        let mut out = Vec::with_capacity(3 + FINGERPRINT_LEN + 3 + FINGERPRINT_LEN + 3 + NONCE_LEN + 66);

        push_tlv(&mut out, TYPE_NOISE_KEY_FP, &self.noise_key_fingerprint)?;
        push_tlv(&mut out, TYPE_SIGNING_KEY_FP, &self.signing_key_fingerprint)?;
        push_tlv(&mut out, TYPE_NONCE, &self.nonce)?;
        if let Some(sig) = &self.signature {
            push_tlv(&mut out, TYPE_SIGNATURE, sig)?;
        }

        if out.len() > MAX_PAYLOAD_BYTES {
            return Err(VerificationTlvError::TooLarge);
        }
        Ok(out)
    }

    /// Decode a TLV stream, skipping unrecognized type bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, VerificationTlvError> {
        if buf.len() > MAX_PAYLOAD_BYTES {
            return Err(VerificationTlvError::TooLarge);
        }

        let mut noise_fp: Option<[u8; FINGERPRINT_LEN]> = None;
        let mut signing_fp: Option<[u8; FINGERPRINT_LEN]> = None;
        let mut nonce: Option<[u8; NONCE_LEN]> = None;
        let mut signature: Option<Vec<u8>> = None;

        let mut pos = 0usize;
        while pos < buf.len() {
            let ty = buf[pos];
            pos += 1;
            let len = read_u8(buf, &mut pos)? as usize;
            let value = read_n(buf, &mut pos, len)?;

            match ty {
                TYPE_NOISE_KEY_FP => {
                    noise_fp = Some(fixed::<FINGERPRINT_LEN>(value)?);
                }
                TYPE_SIGNING_KEY_FP => {
                    signing_fp = Some(fixed::<FINGERPRINT_LEN>(value)?);
                }
                TYPE_NONCE => {
                    nonce = Some(fixed::<NONCE_LEN>(value)?);
                }
                TYPE_SIGNATURE => {
                    signature = Some(value.to_vec());
                }
                _ => {}
            }
        }

        Ok(VerificationMessage {
            noise_key_fingerprint: noise_fp.ok_or(VerificationTlvError::MissingField)?,
            signing_key_fingerprint: signing_fp.ok_or(VerificationTlvError::MissingField)?,
            nonce: nonce.ok_or(VerificationTlvError::MissingField)?,
            signature,
        })
    }
}

fn fixed<const N: usize>(value: &[u8]) -> Result<[u8; N], VerificationTlvError> {
    value.try_into().map_err(|_| VerificationTlvError::InvalidLength)
}

fn push_tlv(out: &mut Vec<u8>, ty: u8, value: &[u8]) -> Result<(), VerificationTlvError> {
    if value.len() > u8::MAX as usize {
        return Err(VerificationTlvError::TooLarge);
    }
    out.push(ty);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
    Ok(())
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8, VerificationTlvError> {
    Ok(read_n(buf, pos, 1)?[0])
}

fn read_n<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], VerificationTlvError> {
    if *pos + n > buf.len() {
        return Err(VerificationTlvError::Malformed);
    }
    let out = &buf[*pos..*pos + n];
    *pos += n;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VerificationMessage {
        VerificationMessage {
            noise_key_fingerprint: [1u8; FINGERPRINT_LEN],
            signing_key_fingerprint: [2u8; FINGERPRINT_LEN],
            nonce: [3u8; NONCE_LEN],
            signature: None,
        }
    }

    #[test]
    fn round_trips_challenge() {
        let m = sample();
        let bytes = m.encode().unwrap();
        assert_eq!(VerificationMessage::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn round_trips_response_with_signature() {
        let mut m = sample();
        m.signature = Some(vec![0xAB; 64]);
        let bytes = m.encode().unwrap();
        assert_eq!(VerificationMessage::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn skips_unknown_tlv() {
        let mut buf = Vec::new();
        buf.push(0xEE);
        buf.push(2);
        buf.extend_from_slice(&[0, 0]);
        let m = sample();
        buf.extend_from_slice(&m.encode().unwrap());
        assert_eq!(VerificationMessage::decode(&buf).unwrap(), m);
    }

    #[test]
    fn rejects_missing_field() {
        let mut out = Vec::new();
        out.push(TYPE_NOISE_KEY_FP);
        out.push(FINGERPRINT_LEN as u8);
        out.extend_from_slice(&[1u8; FINGERPRINT_LEN]);
        assert_eq!(
            VerificationMessage::decode(&out).unwrap_err(),
            VerificationTlvError::MissingField
        );
    }

    #[test]
    fn rejects_wrong_fixed_length() {
        let mut out = Vec::new();
        out.push(TYPE_NOISE_KEY_FP);
        out.push(4);
        out.extend_from_slice(&[1u8; 4]);
        assert_eq!(
            VerificationMessage::decode(&out).unwrap_err(),
            VerificationTlvError::InvalidLength
        );
    }

    #[test]
    fn rejects_oversized_payload() {
        let buf = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        assert_eq!(VerificationMessage::decode(&buf).unwrap_err(), VerificationTlvError::TooLarge);
    }
}
