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

//! In-process Prometheus counters and gauges for the node's hot paths.
//! Exporting them over HTTP is a deployment concern outside this crate.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics registration errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric name collided, or registration otherwise failed.
    #[error("prometheus registration failed")]
    Prom,
}

/// All counters and gauges the node maintains.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all metrics below are registered against.
    pub registry: Registry,

    /// Currently tracked peers.
    pub peers_tracked: IntGauge,
    /// Entries currently held in the offset cache.
    pub cache_size: IntGauge,

    /// Offsets admitted into the cache.
    pub offsets_admitted_total: IntCounter,
    /// Offsets dropped because the signer was not in the trusted set.
    pub untrusted_drops_total: IntCounter,
    /// Offsets dropped because chain verification failed.
    pub verification_failures_total: IntCounter,
    /// Datagrams dropped because they failed to decode.
    pub decode_failures_total: IntCounter,
    /// Cache entries reaped by a periodic eviction pass.
    pub cache_evictions_total: IntCounter,

    /// Echo probes that produced a measurement.
    pub probe_success_total: IntCounter,
    /// Echo probes that timed out or otherwise failed.
    pub probe_failure_total: IntCounter,

    /// Per-peer sends that completed successfully.
    pub publish_success_total: IntCounter,
    /// Per-peer sends that failed.
    pub publish_failure_total: IntCounter,
}

macro_rules! register_counter {
    ($registry:expr, $name:literal, $help:literal) => {{
        let metric = IntCounter::new($name, $help).map_err(|_| MetricsError::Prom)?;
        $registry
            .register(Box::new(metric.clone()))
            .map_err(|_| MetricsError::Prom)?;
        metric
    }};
}

macro_rules! register_gauge {
    ($registry:expr, $name:literal, $help:literal) => {{
        let metric = IntGauge::new($name, $help).map_err(|_| MetricsError::Prom)?;
        $registry
            .register(Box::new(metric.clone()))
            .map_err(|_| MetricsError::Prom)?;
        metric
    }};
}

impl Metrics {
    /// Create a fresh registry and register every metric against it.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let peers_tracked = register_gauge!(registry, "gvp_peers_tracked", "Currently tracked peers");
        let cache_size = register_gauge!(registry, "gvp_cache_size", "Entries held in the offset cache");

        let offsets_admitted_total = register_counter!(
            registry,
            "gvp_offsets_admitted_total",
            "Offsets admitted into the cache"
        );
        let untrusted_drops_total = register_counter!(
            registry,
            "gvp_untrusted_drops_total",
            "Offsets dropped for an untrusted signer"
        );
        let verification_failures_total = register_counter!(
            registry,
            "gvp_verification_failures_total",
            "Offsets dropped for failing chain verification"
        );
        let decode_failures_total = register_counter!(
            registry,
            "gvp_decode_failures_total",
            "Datagrams dropped for failing to decode"
        );
        let cache_evictions_total = register_counter!(
            registry,
            "gvp_cache_evictions_total",
            "Cache entries reaped by periodic eviction"
        );

        let probe_success_total = register_counter!(
            registry,
            "gvp_probe_success_total",
            "Echo probes that produced a measurement"
        );
        let probe_failure_total = register_counter!(
            registry,
            "gvp_probe_failure_total",
            "Echo probes that timed out or failed"
        );

        let publish_success_total = register_counter!(
            registry,
            "gvp_publish_success_total",
            "Per-peer sends that completed"
        );
        let publish_failure_total = register_counter!(
            registry,
            "gvp_publish_failure_total",
            "Per-peer sends that failed"
        );

        Ok(Self {
            registry,
            peers_tracked,
            cache_size,
            offsets_admitted_total,
            untrusted_drops_total,
            verification_failures_total,
            decode_failures_total,
            cache_evictions_total,
            probe_success_total,
            probe_failure_total,
            publish_success_total,
            publish_failure_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_every_metric_without_name_collisions() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.registry.gather().len(), 11);
    }

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.offsets_admitted_total.get(), 0);
        metrics.offsets_admitted_total.inc();
        assert_eq!(metrics.offsets_admitted_total.get(), 1);
    }
}
