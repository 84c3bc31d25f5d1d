// Copyright (c) 2026 Gvp
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
#![warn(missing_docs)]

//! Ed25519 signing and recursive chain verification.

use super::codec::signing_bytes;
use super::types::LocationOffset;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;

/// Signing/verification errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material could not be parsed.
    #[error("invalid key encoding")]
    InvalidKey,
    /// Signature did not verify, or `authority_pubkey` was all-zero, at the
    /// given depth in the chain (0 is the offset passed to `verify_chain`
    /// itself; 1 is its first-level reference, and so on).
    #[error("signature invalid at chain depth {0}")]
    SignatureInvalid(usize),
}

/// Signer backend abstraction, mirroring the shape of an HSM-backed signer:
/// callers supply key material (PKCS#8 bytes) and never see it again.
pub trait Signer: Send + Sync {
    /// Ed25519 public key bytes.
    fn public_key(&self) -> [u8; 32];
    /// Sign raw message bytes.
    fn sign_bytes(&self, msg: &[u8]) -> [u8; 64];
}

/// File- or memory-backed Ed25519 signer built from PKCS#8 key material.
///
/// Loading that material from disk or an environment variable is an
/// external collaborator's responsibility (`spec.md` §1); this type only
/// parses bytes the caller already has in hand.
pub struct Ed25519Signer {
    keypair: Ed25519KeyPair,
}

impl Ed25519Signer {
    /// Parse an Ed25519 keypair from PKCS#8 bytes.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, CryptoError> {
        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { keypair })
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> [u8; 32] {
        let pk = self.keypair.public_key().as_ref();
        let mut out = [0u8; 32];
        out.copy_from_slice(pk);
        out
    }

    fn sign_bytes(&self, msg: &[u8]) -> [u8; 64] {
        let sig = self.keypair.sign(msg);
        let mut out = [0u8; 64];
        out.copy_from_slice(sig.as_ref());
        out
    }
}

/// Fill in `authority_pubkey` and `signature` from `signer`. Already-signed
/// references are left byte-exact (serialized, never re-signed).
pub fn sign(offset: &mut LocationOffset, signer: &dyn Signer) {
    offset.authority_pubkey = signer.public_key();
    let bytes = signing_bytes(offset);
    offset.signature = signer.sign_bytes(&bytes);
}

/// Verify a single offset's signature against its own `authority_pubkey`.
/// Always reports depth 0 — callers verifying a chain should use
/// [`verify_chain`], which attributes failures to the offending depth.
pub fn verify(offset: &LocationOffset) -> Result<(), CryptoError> {
    verify_at_depth(offset, 0)
}

fn verify_at_depth(offset: &LocationOffset, depth: usize) -> Result<(), CryptoError> {
    if offset.authority_pubkey == [0u8; 32] {
        return Err(CryptoError::SignatureInvalid(depth));
    }
    let pk = UnparsedPublicKey::new(&ED25519, &offset.authority_pubkey);
    let msg = signing_bytes(offset);
    pk.verify(&msg, &offset.signature)
        .map_err(|_| CryptoError::SignatureInvalid(depth))
}

/// Recursively verify an offset and every reference in its chain. The first
/// failure aborts and propagates, carrying the depth at which it occurred
/// (0 is `offset` itself) so callers can warn-log the offending entry.
pub fn verify_chain(offset: &LocationOffset) -> Result<(), CryptoError> {
    verify_chain_at_depth(offset, 0)
}

fn verify_chain_at_depth(offset: &LocationOffset, depth: usize) -> Result<(), CryptoError> {
    verify_at_depth(offset, depth)?;
    for r in &offset.references {
        verify_chain_at_depth(r, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;

    fn new_signer() -> Ed25519Signer {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        Ed25519Signer::from_pkcs8(pkcs8.as_ref()).unwrap()
    }

    fn unsigned(references: Vec<LocationOffset>) -> LocationOffset {
        LocationOffset {
            signature: [0u8; 64],
            authority_pubkey: [0u8; 32],
            measurement_slot: 100,
            lat: 50.11,
            lng: 8.68,
            measured_rtt_ns: 800_000,
            rtt_ns: 800_000,
            references,
        }
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let signer = new_signer();
        let mut o = unsigned(vec![]);
        sign(&mut o, &signer);
        assert!(verify(&o).is_ok());
        assert_eq!(o.authority_pubkey, signer.public_key());
    }

    #[test]
    fn verify_rejects_zero_signature() {
        let o = unsigned(vec![]);
        assert_eq!(verify(&o), Err(CryptoError::SignatureInvalid(0)));
    }

    #[test]
    fn tampering_with_a_field_breaks_verification() {
        let signer = new_signer();
        let mut o = unsigned(vec![]);
        sign(&mut o, &signer);
        o.measured_rtt_ns += 1;
        assert_eq!(verify(&o), Err(CryptoError::SignatureInvalid(0)));
    }

    #[test]
    fn tampering_with_a_reference_breaks_chain_verification() {
        let signer = new_signer();
        let mut anchor = unsigned(vec![]);
        sign(&mut anchor, &signer);

        let mut composite = unsigned(vec![anchor.clone()]);
        sign(&mut composite, &signer);
        assert!(verify_chain(&composite).is_ok());

        composite.references[0].measured_rtt_ns += 1;
        assert_eq!(verify_chain(&composite), Err(CryptoError::SignatureInvalid(1)));
    }

    #[test]
    fn signing_a_chain_preserves_child_signatures_byte_exact() {
        let signer = new_signer();
        let mut anchor = unsigned(vec![]);
        sign(&mut anchor, &signer);
        let anchor_sig = anchor.signature;

        let mut composite = unsigned(vec![anchor]);
        sign(&mut composite, &signer);

        assert_eq!(composite.references[0].signature, anchor_sig);
    }
}
