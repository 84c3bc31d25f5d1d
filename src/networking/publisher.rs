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

//! Builds and signs composite offsets from fresh measurements plus the best
//! cached anchor, and fans them out to peers with bounded parallelism
//! (`spec.md` §4.6).

use crate::core::crypto::{self, Signer};
use crate::core::sources::{LocationSource, SlotSource};
use crate::core::types::{LocationOffset, PeerAddress};
use crate::monitoring::metrics::Metrics;
use crate::networking::transport::{self, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::time::Instant;
use tracing::warn;

/// Upper bound on concurrent in-flight per-peer sends within one publish.
const MAX_CONCURRENT_SENDS: usize = 100;

/// Errors a single `publish` cycle can report.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Self-location unavailable and no cached value to fall back on.
    #[error("self location unavailable")]
    LocationUnavailable,
    /// Current slot unavailable and no cached value to fall back on.
    #[error("slot unavailable")]
    SlotUnavailable,
}

/// Per-peer send failure, aggregated into a [`PublishReport`].
#[derive(Debug, Error)]
pub enum PeerPublishError {
    /// Transport-level failure sending to this peer.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// No send socket registered for this peer.
    #[error("no socket registered for peer")]
    NoSocket,
}

/// Outcome of one `publish` call: overall success iff `failures` is empty.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Per-peer failures; other peers are unaffected by one peer's failure.
    pub failures: Vec<(PeerAddress, PeerPublishError)>,
}

impl PublishReport {
    /// True iff every peer that was given a measurement succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct CachedLocation {
    value: Option<(f64, f64)>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

struct CachedSlot {
    value: Option<u64>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

/// Maintains per-peer send sockets, signing key, and the self-location/slot
/// caches, and emits signed composite offsets.
pub struct Publisher {
    signer: Arc<dyn Signer>,
    location_source: Arc<dyn LocationSource>,
    slot_source: Arc<dyn SlotSource>,
    sockets: RwLock<HashMap<PeerAddress, Arc<UdpSocket>>>,
    location_cache: Mutex<CachedLocation>,
    slot_cache: Mutex<CachedSlot>,
}

impl Publisher {
    /// Create a new publisher. `location_ttl` and `slot_ttl` are the TTLs
    /// from `spec.md` §4.6 (defaults: ~24h and ~5min respectively).
    pub fn new(
        signer: Arc<dyn Signer>,
        location_source: Arc<dyn LocationSource>,
        slot_source: Arc<dyn SlotSource>,
        location_ttl: Duration,
        slot_ttl: Duration,
    ) -> Self {
        Self {
            signer,
            location_source,
            slot_source,
            sockets: RwLock::new(HashMap::new()),
            location_cache: Mutex::new(CachedLocation {
                value: None,
                fetched_at: None,
                ttl: location_ttl,
            }),
            slot_cache: Mutex::new(CachedSlot {
                value: None,
                fetched_at: None,
                ttl: slot_ttl,
            }),
        }
    }

    /// Register a per-peer send socket. Mirrors [`crate::networking::prober::Prober::add_peer`].
    pub async fn add_peer(&self, addr: PeerAddress) -> std::io::Result<()> {
        let sock = transport::open_sender().await?;
        self.sockets.write().await.insert(addr, Arc::new(sock));
        Ok(())
    }

    /// Forget a peer's send socket.
    pub async fn remove_peer(&self, addr: PeerAddress) {
        self.sockets.write().await.remove(&addr);
    }

    /// Fetches from `location_source` without holding `location_cache`'s
    /// lock (`spec.md` §5: "no locks held across I/O or task-yield
    /// points"), then takes the lock only to read or update the cached
    /// value.
    async fn resolve_location(&self) -> Result<(f64, f64), PublishError> {
        let fetched = self.location_source.get_self_location().await;

        let mut cache = self.location_cache.lock().await;
        match fetched {
            Ok(loc) => {
                cache.value = Some(loc);
                cache.fetched_at = Some(Instant::now());
                Ok(loc)
            }
            Err(_) => match (cache.value, cache.fetched_at) {
                (Some(loc), Some(at)) if at.elapsed() <= cache.ttl => Ok(loc),
                (Some(loc), None) => Ok(loc),
                _ => Err(PublishError::LocationUnavailable),
            },
        }
    }

    /// Same unlocked-fetch-then-locked-update shape as [`Self::resolve_location`].
    async fn resolve_slot(&self) -> Result<u64, PublishError> {
        let fetched = self.slot_source.current_slot().await;

        let mut cache = self.slot_cache.lock().await;
        match fetched {
            Ok(slot) => {
                cache.value = Some(slot);
                cache.fetched_at = Some(Instant::now());
                Ok(slot)
            }
            Err(_) => match (cache.value, cache.fetched_at) {
                (Some(slot), Some(at)) if at.elapsed() <= cache.ttl => Ok(slot),
                _ => Err(PublishError::SlotUnavailable),
            },
        }
    }

    /// Build, sign, and send one composite offset per `(peer, measured_rtt)`
    /// entry, carrying `anchor` as the sole reference. Steps match
    /// `spec.md` §4.6 exactly, including the empty-map fast path and the
    /// "no anchor ⇒ skip, not an error" case.
    pub async fn publish(
        &self,
        measured: HashMap<PeerAddress, u64>,
        anchor: Option<LocationOffset>,
        metrics: &Metrics,
    ) -> Result<PublishReport, PublishError> {
        if measured.is_empty() {
            return Ok(PublishReport::default());
        }

        let (lat, lng) = self.resolve_location().await?;
        let slot = self.resolve_slot().await?;

        let Some(anchor) = anchor else {
            warn!("no cached anchor offset available; skipping composite emission this cycle");
            return Ok(PublishReport::default());
        };

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_SENDS));
        let sockets = self.sockets.read().await.clone();
        let mut set = tokio::task::JoinSet::new();

        for (peer, measured_rtt_ns) in measured {
            let permit = Arc::clone(&semaphore);
            let sock = sockets.get(&peer).cloned();
            let anchor = anchor.clone();
            let signer = Arc::clone(&self.signer);

            set.spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let Some(sock) = sock else {
                    return (peer, Err(PeerPublishError::NoSocket));
                };

                let mut offset = LocationOffset {
                    signature: [0u8; 64],
                    authority_pubkey: [0u8; 32],
                    measurement_slot: slot,
                    lat,
                    lng,
                    measured_rtt_ns,
                    rtt_ns: anchor.rtt_ns + measured_rtt_ns,
                    references: vec![anchor],
                };
                crypto::sign(&mut offset, signer.as_ref());

                let send_result = transport::send(&sock, peer.to_socket_addr(), &offset).await;
                (peer, send_result.map_err(PeerPublishError::from))
            });
        }

        let mut report = PublishReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((peer, Ok(()))) => {
                    metrics.publish_success_total.inc();
                    let _ = peer;
                }
                Ok((peer, Err(e))) => {
                    metrics.publish_failure_total.inc();
                    warn!(%peer, err = %e, "publish failed for peer");
                    report.failures.push((peer, e));
                }
                Err(e) => {
                    warn!(err = %e, "publish worker task panicked");
                }
            }
        }

        Ok(report)
    }
}
