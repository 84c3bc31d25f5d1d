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

//! RTT measurement over a bounded set of peers via a two-way echo, driven by
//! a worker pool with stagger (`spec.md` §4.5).
//!
//! The echo wire protocol itself is a black box outside this spec's scope
//! (§6.2); [`EchoClient`] is the seam a deployment plugs a real one into.

use crate::core::types::PeerAddress;
use crate::monitoring::metrics::Metrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Worker/batch sizing constants (`spec.md` §4.5).
const MAX_WORKERS: usize = 32;
const PEERS_PER_WORKER: usize = 512;

/// Errors adding a peer to the prober.
#[derive(Debug, Error)]
pub enum ProberError {
    /// Address failed to validate.
    #[error("invalid peer address")]
    PeerAddInvalid,
}

/// A single echo round-trip measurement, abstracting the actual wire
/// protocol used to ping a peer.
#[async_trait]
pub trait EchoClient: Send + Sync {
    /// Perform one echo probe against `peer`, bounded by `timeout`.
    /// Returns the measured RTT in nanoseconds, or `None` on any failure
    /// (timeout, send error, malformed reply) — failures are silent at the
    /// per-probe level per `spec.md` §4.5.
    async fn probe(&self, peer: PeerAddress, timeout: Duration) -> Option<u64>;
}

/// Drives RTT measurement across the configured peer set.
pub struct Prober<E: EchoClient> {
    echo: Arc<E>,
    peers: RwLock<Vec<PeerAddress>>,
    probe_timeout: Duration,
    stagger_delay: Duration,
    metrics: Metrics,
}

impl<E: EchoClient + 'static> Prober<E> {
    /// Create a prober with no peers yet.
    pub fn new(echo: Arc<E>, probe_timeout: Duration, stagger_delay: Duration, metrics: Metrics) -> Self {
        Self {
            echo,
            peers: RwLock::new(Vec::new()),
            probe_timeout,
            stagger_delay,
            metrics,
        }
    }

    /// Idempotently add a peer. The echo client validates/connects lazily on
    /// first probe, so there is nothing to roll back here beyond the
    /// address itself already having been validated by the caller (the
    /// `FromStr` impl on [`PeerAddress`] is the validation step).
    pub async fn add_peer(&self, addr: PeerAddress) {
        let mut peers = self.peers.write().await;
        if !peers.contains(&addr) {
            peers.push(addr);
        }
    }

    /// Idempotently remove a peer.
    pub async fn remove_peer(&self, addr: PeerAddress) {
        let mut peers = self.peers.write().await;
        peers.retain(|p| *p != addr);
    }

    /// Measure RTT to every configured peer, partitioned into bounded
    /// worker batches with an inter-probe stagger. Never fails: an empty
    /// map is a valid, expected outcome. `cancel` terminates worker loops
    /// immediately, returning whatever partial results were recorded.
    pub async fn measure_all(&self, cancel: &CancellationToken) -> HashMap<PeerAddress, u64> {
        let peers = self.peers.read().await.clone();
        if peers.is_empty() {
            return HashMap::new();
        }

        let worker_count = (MAX_WORKERS).min(peers.len().div_ceil(PEERS_PER_WORKER).max(1));
        let mut batches: Vec<Vec<PeerAddress>> = vec![Vec::new(); worker_count];
        for (i, peer) in peers.into_iter().enumerate() {
            batches[i % worker_count].push(peer);
        }

        let mut set = JoinSet::new();
        for batch in batches {
            let echo = Arc::clone(&self.echo);
            let probe_timeout = self.probe_timeout;
            let stagger_delay = self.stagger_delay;
            let cancel = cancel.clone();
            let metrics = self.metrics.clone();
            set.spawn(async move {
                let mut results = Vec::new();
                for peer in batch {
                    if cancel.is_cancelled() {
                        break;
                    }
                    match echo.probe(peer, probe_timeout).await {
                        Some(rtt_ns) => {
                            metrics.probe_success_total.inc();
                            results.push((peer, rtt_ns));
                        }
                        None => metrics.probe_failure_total.inc(),
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(stagger_delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                results
            });
        }

        let mut out = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(results) => out.extend(results),
                Err(e) => warn!(err = %e, "prober worker task panicked"),
            }
        }
        out
    }
}

/// Parse and validate a peer address string, per `spec.md` §3.2/§4.5.
pub fn validate_peer_address(s: &str) -> Result<PeerAddress, ProberError> {
    s.parse().map_err(|_| ProberError::PeerAddInvalid)
}
