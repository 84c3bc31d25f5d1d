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

//! Core wire types for the Geolocation Verification Protocol.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Maximum total reference count across an entire chain (recursively summed).
pub const MAX_TOTAL_REFERENCES: usize = 5;
/// Maximum reference nesting depth.
pub const MAX_REFERENCE_DEPTH: usize = 2;
/// Maximum serialized size of a single `LocationOffset`, chosen as a
/// conservative IPv4 UDP MTU (see `spec.md` §9, open question 2).
pub const MAX_DATAGRAM_BYTES: usize = 1232;

/// A signed latency attestation binding a public key to a geographic anchor
/// point, a measured hop RTT, and an accumulated chain RTT.
///
/// `references` is the recursive-by-value proof chain: each entry is itself
/// a fully signed `LocationOffset`, never a shared handle. A new offset that
/// embeds another deep-copies it into its `references` list.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationOffset {
    /// Ed25519 signature over [`crate::core::codec::signing_bytes`].
    pub signature: [u8; 64],
    /// Ed25519 public key of the signer; also the cache and trust key.
    pub authority_pubkey: [u8; 32],
    /// Blockchain slot at measurement time (coarse, monotonic clock).
    pub measurement_slot: u64,
    /// Anchor latitude, WGS84 degrees.
    pub lat: f64,
    /// Anchor longitude, WGS84 degrees.
    pub lng: f64,
    /// RTT observed by this signer on the hop that produced this offset.
    pub measured_rtt_ns: u64,
    /// Accumulated RTT from the anchor to the terminal target along this chain.
    pub rtt_ns: u64,
    /// Nested attestations this offset derives from, in order.
    pub references: Vec<LocationOffset>,
}

impl LocationOffset {
    /// True if this offset roots a chain (no references).
    pub fn is_anchor(&self) -> bool {
        self.references.is_empty()
    }

    /// Total reference count, recursively summed over the whole tree.
    pub fn total_reference_count(&self) -> usize {
        self.references
            .iter()
            .map(|r| 1 + r.total_reference_count())
            .sum()
    }

    /// Maximum nesting depth of `references` below this offset (0 if anchor).
    pub fn reference_depth(&self) -> usize {
        self.references
            .iter()
            .map(|r| 1 + r.reference_depth())
            .max()
            .unwrap_or(0)
    }
}

/// A peer's UDP endpoint. Only literal IPv4 hosts are accepted; hostname
/// resolution is a deployment concern outside this crate (`spec.md` §3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    host: Ipv4Addr,
    port: u16,
}

/// Errors constructing a [`PeerAddress`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PeerAddressError {
    /// Missing or malformed `host:port` separator.
    #[error("malformed peer address")]
    Malformed,
    /// Host did not parse as a literal IPv4 address.
    #[error("host is not a literal IPv4 address")]
    InvalidHost,
    /// Port failed to parse, or was zero.
    #[error("port must be a nonzero u16")]
    InvalidPort,
}

impl PeerAddress {
    /// Construct from already-validated parts.
    pub fn new(host: Ipv4Addr, port: u16) -> Result<Self, PeerAddressError> {
        if port == 0 {
            return Err(PeerAddressError::InvalidPort);
        }
        Ok(Self { host, port })
    }

    /// The IPv4 host.
    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The `std::net` socket address for this peer.
    pub fn to_socket_addr(self) -> std::net::SocketAddr {
        std::net::SocketAddr::V4(std::net::SocketAddrV4::new(self.host, self.port))
    }
}

impl FromStr for PeerAddress {
    type Err = PeerAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or(PeerAddressError::Malformed)?;
        let host: Ipv4Addr = host.parse().map_err(|_| PeerAddressError::InvalidHost)?;
        let port: u16 = port.parse().map_err(|_| PeerAddressError::InvalidPort)?;
        Self::new(host, port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl<'de> Deserialize<'de> for PeerAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
