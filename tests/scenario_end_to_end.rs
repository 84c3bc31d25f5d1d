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

use async_trait::async_trait;
use gvp_node::core::cache::OffsetCache;
use gvp_node::core::crypto::{self, Ed25519Signer, Signer};
use gvp_node::core::sources::{LocationSource, SlotSource, SourceError};
use gvp_node::core::types::{LocationOffset, PeerAddress};
use gvp_node::monitoring::metrics::Metrics;
use gvp_node::networking::publisher::Publisher;
use gvp_node::networking::transport;
use gvp_node::networking::trust::TrustFilter;
use ring::rand::SystemRandom;
use ring::signature::Ed25519KeyPair;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn new_signer() -> Ed25519Signer {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
    Ed25519Signer::from_pkcs8(pkcs8.as_ref()).unwrap()
}

struct FixedLocation(f64, f64);
#[async_trait]
impl LocationSource for FixedLocation {
    async fn get_self_location(&self) -> Result<(f64, f64), SourceError> {
        Ok((self.0, self.1))
    }
}

struct FixedSlot(u64);
#[async_trait]
impl SlotSource for FixedSlot {
    async fn current_slot(&self) -> Result<u64, SourceError> {
        Ok(self.0)
    }
}

fn anchor_from(signer: &Ed25519Signer) -> LocationOffset {
    let mut anchor = LocationOffset {
        signature: [0u8; 64],
        authority_pubkey: [0u8; 32],
        measurement_slot: 100,
        lat: 50.11,
        lng: 8.68,
        measured_rtt_ns: 800_000,
        rtt_ns: 800_000,
        references: vec![],
    };
    crypto::sign(&mut anchor, signer);
    anchor
}

/// S1: a trusted anchor plus a fresh measurement composes into a signed
/// offset with the expected fields, and the recipient's chain verifies.
#[tokio::test]
async fn anchor_cycle_composes_and_verifies() {
    let anchor_signer = new_signer();
    let anchor = anchor_from(&anchor_signer);

    let mut trusted = HashSet::new();
    trusted.insert(anchor_signer.public_key());
    let trust = TrustFilter::new(trusted);
    let cache = OffsetCache::new(Duration::from_secs(3600));
    let metrics = Metrics::new().unwrap();

    let fake_sender: std::net::SocketAddr = "198.51.100.1:4700".parse().unwrap();
    trust.admit(anchor.clone(), fake_sender, &cache, &metrics).await;
    let best = cache.get_best().expect("anchor should be cached");
    assert_eq!(best, anchor);

    let listener = transport::open_listener(0).await.unwrap();
    let listen_addr = listener.local_addr().unwrap();
    let peer = PeerAddress::new(
        match listen_addr.ip() {
            std::net::IpAddr::V4(v4) => v4,
            _ => unreachable!(),
        },
        listen_addr.port(),
    )
    .unwrap();

    let self_signer = new_signer();
    let publisher = Publisher::new(
        Arc::new(self_signer),
        Arc::new(FixedLocation(50.11, 8.68)),
        Arc::new(FixedSlot(250)),
        Duration::from_secs(3600),
        Duration::from_secs(300),
    );
    publisher.add_peer(peer).await.unwrap();

    let mut measured = HashMap::new();
    measured.insert(peer, 12_500_000u64);

    let report = publisher.publish(measured, Some(best), &metrics).await.unwrap();
    assert!(report.is_success());

    let (received, _from) = transport::recv(&listener, Duration::from_secs(1)).await.unwrap();
    assert_eq!(received.lat, 50.11);
    assert_eq!(received.lng, 8.68);
    assert_eq!(received.measured_rtt_ns, 12_500_000);
    assert_eq!(received.rtt_ns, 13_300_000);
    assert_eq!(received.references.len(), 1);
    assert_eq!(received.references[0], anchor);
    assert!(crypto::verify_chain(&received).is_ok());
}

/// S2: an anchor signed by an untrusted signer never enters the cache, so
/// a measurement cycle with no other anchor has nothing to compose and
/// skips emission.
#[tokio::test]
async fn untrusted_anchor_is_dropped_and_cycle_skips_emission() {
    let untrusted_signer = new_signer();
    let anchor = anchor_from(&untrusted_signer);

    let trust = TrustFilter::new(HashSet::new());
    let cache = OffsetCache::new(Duration::from_secs(3600));
    let metrics = Metrics::new().unwrap();

    let fake_sender: std::net::SocketAddr = "198.51.100.1:4700".parse().unwrap();
    trust.admit(anchor, fake_sender, &cache, &metrics).await;
    assert!(cache.is_empty());
    assert!(cache.get_best().is_none());

    let listener = transport::open_listener(0).await.unwrap();
    let listen_addr = listener.local_addr().unwrap();
    let peer = PeerAddress::new(
        match listen_addr.ip() {
            std::net::IpAddr::V4(v4) => v4,
            _ => unreachable!(),
        },
        listen_addr.port(),
    )
    .unwrap();

    let self_signer = new_signer();
    let publisher = Publisher::new(
        Arc::new(self_signer),
        Arc::new(FixedLocation(1.0, 2.0)),
        Arc::new(FixedSlot(1)),
        Duration::from_secs(3600),
        Duration::from_secs(300),
    );
    publisher.add_peer(peer).await.unwrap();

    let mut measured = HashMap::new();
    measured.insert(peer, 1000u64);

    let report = publisher
        .publish(measured, cache.get_best(), &metrics)
        .await
        .unwrap();
    assert!(report.is_success());

    let nothing = transport::recv(&listener, Duration::from_millis(100)).await;
    assert!(nothing.is_err(), "no offset should have been emitted");
}
