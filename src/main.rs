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

//! GVP node entrypoint (systemd-friendly). Binds the offset-ingest and echo
//! sockets, wires the coordinator, receiver loop, and shutdown signal, and
//! keeps the process alive until `SIGINT`/`SIGTERM`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gvp_node::config::GvpConfig;
use gvp_node::core::cache::OffsetCache;
use gvp_node::core::crypto::{Ed25519Signer, Signer};
use gvp_node::core::sources::{LocationSource, SlotSource, SourceError};
use gvp_node::coordinator::{Coordinator, PeerSetDelta};
use gvp_node::monitoring::metrics::Metrics;
use gvp_node::networking::echo::{run_echo_responder, UdpEchoClient};
use gvp_node::networking::prober::Prober;
use gvp_node::networking::publisher::Publisher;
use gvp_node::networking::receiver::run_receiver;
use gvp_node::networking::transport;
use gvp_node::networking::trust::TrustFilter;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Placeholder location source until a real service-registry client is
/// wired in by the embedding binary; always reports unavailable so the
/// Publisher falls back to its cache.
struct UnconfiguredLocationSource;

#[async_trait::async_trait]
impl LocationSource for UnconfiguredLocationSource {
    async fn get_self_location(&self) -> Result<(f64, f64), SourceError> {
        Err(SourceError)
    }
}

/// Placeholder slot source until a real ledger RPC client is wired in.
struct UnconfiguredSlotSource;

#[async_trait::async_trait]
impl SlotSource for UnconfiguredSlotSource {
    async fn current_slot(&self) -> Result<u64, SourceError> {
        Err(SourceError)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let cfg = GvpConfig {
        listen_port: env("GVP_LISTEN_PORT", "4700").parse().unwrap_or(4700),
        ..GvpConfig::default()
    };

    info!(port = cfg.listen_port, "gvp node starting");

    let pkcs8 = if cfg.keypair_pkcs8.is_empty() {
        let rng = ring::rand::SystemRandom::new();
        ring::signature::Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| anyhow::anyhow!("failed to generate an ephemeral signing key"))?
            .as_ref()
            .to_vec()
    } else {
        cfg.keypair_pkcs8.clone()
    };
    let signer: Arc<dyn Signer> = Arc::new(
        Ed25519Signer::from_pkcs8(&pkcs8).map_err(|_| anyhow::anyhow!("invalid keypair material"))?,
    );

    let listener = Arc::new(transport::open_listener(cfg.listen_port).await?);
    let echo_sock = Arc::new(transport::open_sender().await?);

    let metrics = Metrics::new().map_err(|_| anyhow::anyhow!("metrics init failed"))?;
    let cache = Arc::new(OffsetCache::new(cfg.max_offset_age));
    let trust = Arc::new(TrustFilter::new(cfg.trusted_signers.clone()));

    let echo_client = Arc::new(UdpEchoClient::new(Arc::clone(&echo_sock)));
    let prober = Prober::new(echo_client, cfg.probe_timeout, cfg.stagger_delay, metrics.clone());
    let publisher = Publisher::new(
        Arc::clone(&signer),
        Arc::new(UnconfiguredLocationSource),
        Arc::new(UnconfiguredSlotSource),
        cfg.location_ttl,
        cfg.slot_ttl,
    );

    for peer in &cfg.peers {
        prober.add_peer(*peer).await;
        if let Err(e) = publisher.add_peer(*peer).await {
            warn!(%peer, err = %e, "failed to register initial peer with publisher");
        }
    }

    let cancel = CancellationToken::new();
    let (_peer_updates_tx, peer_updates_rx) = mpsc::channel::<PeerSetDelta>(32);
    let (_trust_updates_tx, trust_updates_rx) = mpsc::channel::<std::collections::HashSet<[u8; 32]>>(8);

    let coordinator = Coordinator::new(
        prober,
        publisher,
        Arc::clone(&cache),
        Arc::clone(&trust),
        metrics.clone(),
        cfg.probe_interval,
        cfg.eviction_interval,
    );

    let responder_handle = tokio::spawn(run_echo_responder(Arc::clone(&echo_sock)));

    let receiver_cancel = cancel.clone();
    let receiver_listener = Arc::clone(&listener);
    let receiver_cache = Arc::clone(&cache);
    let receiver_trust = Arc::clone(&trust);
    let receiver_metrics = metrics.clone();
    let receiver_handle = tokio::spawn(async move {
        run_receiver(
            &receiver_listener,
            &receiver_trust,
            &receiver_cache,
            &receiver_metrics,
            &receiver_cancel,
        )
        .await;
    });

    let coordinator_cancel = cancel.clone();
    let coordinator_handle = tokio::spawn(async move {
        coordinator
            .run(peer_updates_rx, trust_updates_rx, coordinator_cancel)
            .await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    cancel.cancel();

    let _ = tokio::join!(receiver_handle, coordinator_handle);
    responder_handle.abort();

    Ok(())
}
