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

//! Single-task loop that pulls datagrams off the listening socket and hands
//! them to the trust filter until cancelled (`spec.md` §4.9).

use crate::core::cache::OffsetCache;
use crate::monitoring::metrics::Metrics;
use crate::networking::transport::{self, RecvError};
use crate::networking::trust::TrustFilter;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How long a single `recv` waits before re-checking cancellation.
const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Run the receive loop until `cancel` fires. Does not close `sock` — the
/// caller owns the socket's lifetime.
pub async fn run_receiver(
    sock: &UdpSocket,
    trust: &TrustFilter,
    cache: &OffsetCache,
    metrics: &Metrics,
    cancel: &CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        match transport::recv(sock, READ_DEADLINE).await {
            Ok((offset, from)) => {
                trust.admit(offset, from, cache, metrics).await;
            }
            Err(RecvError::TimedOut) => continue,
            Err(e) => {
                warn!(err = %e, "dropping datagram that failed to decode");
                metrics.decode_failures_total.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::{sign, Ed25519Signer, Signer};
    use crate::core::types::LocationOffset;
    use crate::networking::transport as t;
    use ring::rand::SystemRandom;
    use ring::signature::Ed25519KeyPair;
    use std::collections::HashSet;

    fn new_signer() -> Ed25519Signer {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        Ed25519Signer::from_pkcs8(pkcs8.as_ref()).unwrap()
    }

    #[tokio::test]
    async fn receiver_admits_a_valid_offset_then_stops_on_cancel() {
        let listener = t::open_listener(0).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();
        let sender = t::open_sender().await.unwrap();

        let signer = new_signer();
        let mut offset = LocationOffset {
            signature: [0u8; 64],
            authority_pubkey: [0u8; 32],
            measurement_slot: 1,
            lat: 1.0,
            lng: 2.0,
            measured_rtt_ns: 100,
            rtt_ns: 100,
            references: vec![],
        };
        sign(&mut offset, &signer);
        t::send(&sender, listen_addr, &offset).await.unwrap();

        let mut trusted = HashSet::new();
        trusted.insert(signer.public_key());
        let trust = TrustFilter::new(trusted);
        let cache = OffsetCache::new(Duration::from_secs(60));
        let metrics = Metrics::new().unwrap();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            run_receiver(&listener, &trust, &cache, &metrics, &cancel),
        )
        .await;

        assert!(result.is_ok(), "receiver should stop once cancelled");
        assert_eq!(cache.get(&signer.public_key()).unwrap().rtt_ns, 100);
    }

    #[tokio::test]
    async fn receiver_counts_decode_failures_and_keeps_running() {
        let listener = t::open_listener(0).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();
        let sender = t::open_sender().await.unwrap();
        sender.send_to(b"not a valid offset", listen_addr).await.unwrap();

        let trust = TrustFilter::new(HashSet::new());
        let cache = OffsetCache::new(Duration::from_secs(60));
        let metrics = Metrics::new().unwrap();
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        tokio::time::timeout(
            Duration::from_secs(3),
            run_receiver(&listener, &trust, &cache, &metrics, &cancel),
        )
        .await
        .unwrap();

        assert_eq!(metrics.decode_failures_total.get(), 1);
    }
}
