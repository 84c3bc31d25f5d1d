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

//! Geolocation Verification Protocol node.
//!
//! A peer-to-peer latency-attestation fabric: nodes measure round-trip time
//! to their peers, compose the measurement with the best cached anchor
//! offset into a freshly signed attestation, and publish it onward. This
//! crate provides:
//! - A deterministic wire codec and Ed25519 signing/chain verification
//! - UDP transport, bounded-worker RTT probing, and a bounded-fanout
//!   publisher
//! - A concurrent per-signer TTL cache and a trust filter gating admission
//! - A coordinator tying measurement, eviction, and peer-set updates into
//!   one long-lived task, plus in-process Prometheus metrics

/// Node configuration.
pub mod config;
/// Measurement/eviction/peer-lifecycle coordinator.
pub mod coordinator;
/// Core protocol primitives (wire types, codec, crypto, cache, sources).
pub mod core;
/// Observability (metrics).
pub mod monitoring;
/// Networking (transport, prober, publisher, trust filter, receiver loop).
pub mod networking;
