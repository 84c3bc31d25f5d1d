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

//! Deterministic, length-prefix-free binary codec for [`LocationOffset`].
//!
//! The wire shape is specified down to the byte (little-endian, Borsh-style,
//! no length prefix outside the explicit `num_references` count), so it is
//! hand-written here rather than derived through a serde backend. This
//! module is the boundary where untrusted input enters the system: every
//! other component may assume depth and fanout bounds already hold once a
//! `LocationOffset` has come out of [`decode`].

use super::types::{LocationOffset, MAX_REFERENCE_DEPTH, MAX_TOTAL_REFERENCES};
use thiserror::Error;

/// Codec errors. Never panics on adversarial input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer ran out of bytes before a fixed field completed.
    #[error("truncated offset")]
    Truncated,
    /// Reference nesting depth exceeded `MAX_REFERENCE_DEPTH`.
    #[error("reference depth exceeded")]
    DepthExceeded,
    /// Total reference count (recursively summed) exceeded `MAX_TOTAL_REFERENCES`.
    #[error("reference fanout exceeded")]
    FanoutExceeded,
}

/// Encode an offset to its canonical wire bytes, signature included.
pub fn encode(offset: &LocationOffset) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + 32 + 8 + 8 + 8 + 8 + 8 + 1);
    out.extend_from_slice(&offset.signature);
    encode_unsigned(offset, &mut out);
    out
}

/// Bytes covered by the Ed25519 signature: every field of `offset` except
/// `signature`, followed by each reference's *full* encoded bytes in order
/// (so tampering with a child invalidates the parent, per `spec.md` §4.1).
pub fn signing_bytes(offset: &LocationOffset) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + 8 + 8 + 8 + 8 + 8 + 1);
    encode_unsigned(offset, &mut out);
    out
}

fn encode_unsigned(offset: &LocationOffset, out: &mut Vec<u8>) {
    out.extend_from_slice(&offset.authority_pubkey);
    out.extend_from_slice(&offset.measurement_slot.to_le_bytes());
    out.extend_from_slice(&offset.lat.to_le_bytes());
    out.extend_from_slice(&offset.lng.to_le_bytes());
    out.extend_from_slice(&offset.measured_rtt_ns.to_le_bytes());
    out.extend_from_slice(&offset.rtt_ns.to_le_bytes());
    out.push(offset.references.len() as u8);
    for r in &offset.references {
        out.extend_from_slice(&encode(r));
    }
}

/// Decode a single `LocationOffset` from the front of `buf`.
///
/// Trailing bytes after the parsed offset are not an error — the caller
/// (transport) is responsible for treating "one datagram, one offset" as
/// its own framing contract. Returns the decoded offset and the number of
/// bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(LocationOffset, usize), CodecError> {
    let mut cursor = Cursor { buf, pos: 0 };
    let offset = decode_at(&mut cursor, 0)?;
    let total = offset.total_reference_count();
    if total > MAX_TOTAL_REFERENCES {
        return Err(CodecError::FanoutExceeded);
    }
    Ok((offset, cursor.pos))
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    fn take_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    fn take_u8(&mut self) -> Result<u8, CodecError> {
        let slice = self.take(1)?;
        Ok(slice[0])
    }
}

fn decode_at(cursor: &mut Cursor<'_>, depth: usize) -> Result<LocationOffset, CodecError> {
    let signature = cursor.take_array::<64>()?;
    let authority_pubkey = cursor.take_array::<32>()?;
    let measurement_slot = cursor.take_u64()?;
    let lat = cursor.take_f64()?;
    let lng = cursor.take_f64()?;
    let measured_rtt_ns = cursor.take_u64()?;
    let rtt_ns = cursor.take_u64()?;
    let num_references = cursor.take_u8()? as usize;

    if num_references > 0 && depth >= MAX_REFERENCE_DEPTH {
        return Err(CodecError::DepthExceeded);
    }

    let mut references = Vec::with_capacity(num_references);
    for _ in 0..num_references {
        references.push(decode_at(cursor, depth + 1)?);
    }

    Ok(LocationOffset {
        signature,
        authority_pubkey,
        measurement_slot,
        lat,
        lng,
        measured_rtt_ns,
        rtt_ns,
        references,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(references: Vec<LocationOffset>) -> LocationOffset {
        LocationOffset {
            signature: [7u8; 64],
            authority_pubkey: [9u8; 32],
            measurement_slot: 42,
            lat: 50.11,
            lng: 8.68,
            measured_rtt_ns: 800_000,
            rtt_ns: 800_000,
            references,
        }
    }

    #[test]
    fn round_trips_an_anchor() {
        let o = sample(vec![]);
        let bytes = encode(&o);
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(decoded, o);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn encoding_is_deterministic() {
        let o = sample(vec![sample(vec![])]);
        assert_eq!(encode(&o), encode(&o.clone()));
    }

    #[test]
    fn depth_three_is_rejected() {
        let d2 = sample(vec![sample(vec![])]);
        let d1 = sample(vec![d2]);
        let root = sample(vec![d1]);
        let bytes = encode(&root);
        assert_eq!(decode(&bytes), Err(CodecError::DepthExceeded));
    }

    #[test]
    fn fanout_over_five_is_rejected() {
        // root with 3 refs, each with 1 ref => total 6, matching S4.
        let leaf = sample(vec![]);
        let mid = sample(vec![leaf]);
        let root = sample(vec![mid.clone(), mid.clone(), mid]);
        let bytes = encode(&root);
        assert_eq!(decode(&bytes), Err(CodecError::FanoutExceeded));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let o = sample(vec![]);
        let bytes = encode(&o);
        assert_eq!(decode(&bytes[..bytes.len() - 1]), Err(CodecError::Truncated));
    }

    #[test]
    fn trailing_bytes_are_not_an_error() {
        let o = sample(vec![]);
        let mut bytes = encode(&o);
        bytes.extend_from_slice(b"garbage");
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(decoded, o);
        assert!(consumed < bytes.len());
    }

    #[test]
    fn signing_bytes_changes_when_a_nested_reference_changes() {
        let mut child = sample(vec![]);
        let parent = sample(vec![child.clone()]);
        let before = signing_bytes(&parent);

        child.measured_rtt_ns += 1;
        let tampered_parent = sample(vec![child]);
        let after = signing_bytes(&tampered_parent);

        assert_ne!(before, after);
    }
}
