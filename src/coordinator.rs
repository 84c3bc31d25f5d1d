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

//! Drives the periodic measurement and eviction cycles and applies
//! peer-set updates through a small state machine (`spec.md` §4.8).

use crate::core::cache::OffsetCache;
use crate::core::types::{LocationOffset, PeerAddress};
use crate::monitoring::metrics::Metrics;
use crate::networking::prober::{EchoClient, Prober};
use crate::networking::publisher::Publisher;
use crate::networking::trust::TrustFilter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A batch of peer-set changes applied atomically by the coordinator.
#[derive(Debug, Clone, Default)]
pub struct PeerSetDelta {
    /// Peers to add.
    pub added: Vec<PeerAddress>,
    /// Peers to remove.
    pub removed: Vec<PeerAddress>,
}

/// Lifecycle state of a single peer inside the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerState {
    Proposed,
    Active,
    Rejected,
}

/// Drives measurement and eviction ticks and owns the authoritative peer
/// lifecycle (`Proposed` → `Active` → `Rejected`/removed).
pub struct Coordinator<E: EchoClient + 'static> {
    prober: Prober<E>,
    publisher: Publisher,
    cache: Arc<OffsetCache>,
    trust: Arc<TrustFilter>,
    metrics: Metrics,
    measurement_interval: std::time::Duration,
    eviction_interval: std::time::Duration,
    peer_states: HashMap<PeerAddress, PeerState>,
}

impl<E: EchoClient + 'static> Coordinator<E> {
    /// Construct a coordinator with empty peer state. `cache` and `trust`
    /// are shared with the receiver loop, which is the only other writer.
    pub fn new(
        prober: Prober<E>,
        publisher: Publisher,
        cache: Arc<OffsetCache>,
        trust: Arc<TrustFilter>,
        metrics: Metrics,
        measurement_interval: std::time::Duration,
        eviction_interval: std::time::Duration,
    ) -> Self {
        Self {
            prober,
            publisher,
            cache,
            trust,
            metrics,
            measurement_interval,
            eviction_interval,
            peer_states: HashMap::new(),
        }
    }

    /// Apply a peer-set delta. Each added peer moves `Proposed` → `Active`
    /// once both the Prober and Publisher accept it; a Publisher-side
    /// failure rolls back the Prober-side add rather than leaving the peer
    /// half-registered.
    async fn apply_delta(&mut self, delta: PeerSetDelta) {
        for peer in delta.added {
            self.peer_states.insert(peer, PeerState::Proposed);
            self.prober.add_peer(peer).await;
            match self.publisher.add_peer(peer).await {
                Ok(()) => {
                    self.peer_states.insert(peer, PeerState::Active);
                    info!(%peer, "peer activated");
                }
                Err(e) => {
                    warn!(%peer, err = %e, "publisher rejected peer, rolling back prober registration");
                    self.prober.remove_peer(peer).await;
                    self.peer_states.insert(peer, PeerState::Rejected);
                }
            }
        }

        for peer in delta.removed {
            self.prober.remove_peer(peer).await;
            self.publisher.remove_peer(peer).await;
            self.peer_states.remove(&peer);
            info!(%peer, "peer removed");
        }

        self.metrics.peers_tracked.set(
            self.peer_states
                .values()
                .filter(|s| **s == PeerState::Active)
                .count() as i64,
        );
    }

    async fn run_measurement_cycle(&self, cancel: &CancellationToken) {
        // `self.prober` counts `probe_success_total`/`probe_failure_total`
        // itself, per probe, since only it observes individual failures.
        let measured = self.prober.measure_all(cancel).await;

        let anchor: Option<LocationOffset> = self.cache.get_best();
        match self.publisher.publish(measured, anchor, &self.metrics).await {
            Ok(report) if report.is_success() => {}
            Ok(report) => {
                warn!(failures = report.failures.len(), "publish cycle had per-peer failures");
            }
            Err(e) => {
                warn!(err = %e, "publish cycle aborted");
            }
        }
    }

    fn run_eviction_cycle(&self) {
        let evicted = self.cache.evict();
        if evicted > 0 {
            self.metrics.cache_evictions_total.inc_by(evicted as u64);
        }
        self.metrics.cache_size.set(self.cache.len() as i64);
    }

    /// Drive both periodic ticks, the peer-set update channel, and the
    /// trusted-signer-set update channel until `cancel` fires. A message on
    /// `trust_updates` replaces the whole trusted set atomically
    /// (`spec.md` §3.5/§9) rather than merging into it.
    pub async fn run(
        mut self,
        mut peer_updates: mpsc::Receiver<PeerSetDelta>,
        mut trust_updates: mpsc::Receiver<HashSet<[u8; 32]>>,
        cancel: CancellationToken,
    ) {
        let mut measurement_tick = tokio::time::interval(self.measurement_interval);
        let mut eviction_tick = tokio::time::interval(self.eviction_interval);
        measurement_tick.tick().await;
        eviction_tick.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("coordinator shutting down");
                    return;
                }
                _ = measurement_tick.tick() => {
                    self.run_measurement_cycle(&cancel).await;
                }
                _ = eviction_tick.tick() => {
                    self.run_eviction_cycle();
                }
                delta = peer_updates.recv() => {
                    match delta {
                        Some(delta) => self.apply_delta(delta).await,
                        None => {
                            info!("peer update channel closed; coordinator continues on timers alone");
                        }
                    }
                }
                update = trust_updates.recv() => {
                    match update {
                        Some(new_trusted) => {
                            info!(count = new_trusted.len(), "replacing trusted signer set");
                            self.trust.replace_trusted(new_trusted).await;
                        }
                        None => {
                            info!("trust update channel closed; trusted set is now fixed");
                        }
                    }
                }
            }
        }
    }
}
