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

//! Cryptographic key material as opaque handles (spec §9 design note:
//! "the core never touches private keys directly"). Identity key storage
//! and the signature/KDF/AEAD stack itself are named out of scope in
//! spec §1; this module only defines the seam the router, gossip manager
//! and overlay transport sign and verify through, plus a `ring`-backed
//! `Verifier` used by tests and by any host that wants the default Ed25519
//! behavior without writing its own.

use ring::signature::{UnparsedPublicKey, ED25519};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Signature/verification errors. Never exposes *why* a signature failed —
/// that information is a side channel.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The signature did not verify.
    #[error("signature invalid")]
    Invalid,
    /// A key or signature was the wrong length for the algorithm.
    #[error("bad encoding")]
    BadEncoding,
}

/// Something that can sign bytes on behalf of this node's identity. The
/// core never sees the private key; it only calls through this trait.
pub trait Signer: Send + Sync {
    /// This node's public key bytes (32-byte Ed25519 public key).
    fn public_key(&self) -> [u8; 32];
    /// Sign `msg`, returning a detached signature.
    fn sign(&self, msg: &[u8]) -> Vec<u8>;
}

/// Something that can verify a signature against a public key. Split from
/// [`Signer`] because verification never needs private key material and a
/// router verifying other peers' packets has no [`Signer`] of its own.
pub trait Verifier: Send + Sync {
    /// Verify `sig` over `msg` under `pubkey`.
    fn verify(&self, pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), CryptoError>;
}

/// Default Ed25519 verifier backed by `ring`. Suitable wherever a host
/// application hasn't supplied its own [`Verifier`] (e.g. unit tests, or a
/// minimal integration that doesn't need HSM-backed verification).
#[derive(Clone, Copy, Default)]
pub struct RingEd25519Verifier;

impl Verifier for RingEd25519Verifier {
    fn verify(&self, pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), CryptoError> {
        if pubkey.len() != 32 || sig.len() != 64 {
            return Err(CryptoError::BadEncoding);
        }
        let key = UnparsedPublicKey::new(&ED25519, pubkey);
        key.verify(msg, sig).map_err(|_| CryptoError::Invalid)
    }
}

/// Constant-time comparison of two fixed-size digests (used by the
/// verification-handshake TLV to compare a received nonce echo against the
/// expected one without leaking timing information about where they first
/// differ).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    #[test]
    fn ring_verifier_round_trips() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let pk = kp.public_key().as_ref().to_vec();
        let msg = b"hello bitmesh";
        let sig = kp.sign(msg);

        let verifier = RingEd25519Verifier;
        assert!(verifier.verify(&pk, msg, sig.as_ref()).is_ok());
        assert!(verifier.verify(&pk, b"tampered", sig.as_ref()).is_err());
    }

    #[test]
    fn ct_eq_matches_slice_eq() {
        assert!(ct_eq(b"abcd", b"abcd"));
        assert!(!ct_eq(b"abcd", b"abce"));
        assert!(!ct_eq(b"abc", b"abcd"));
    }
}
