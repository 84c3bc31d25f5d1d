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

//! Node configuration (`spec.md` §6.3). Loading this from disk or the
//! environment is a deployment concern outside this crate; only the typed
//! shape lives here.

use crate::core::types::PeerAddress;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

fn default_listen_port() -> u16 {
    4700
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_max_offset_age() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_eviction_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_stagger_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_location_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_slot_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Full node configuration, mirroring `spec.md` §6.3 field for field.
#[derive(Debug, Clone, Deserialize)]
pub struct GvpConfig {
    /// Signers whose offsets are accepted; empty rejects everything.
    #[serde(default)]
    pub trusted_signers: HashSet<[u8; 32]>,

    /// Initial probe/publish target set.
    #[serde(default)]
    pub peers: Vec<PeerAddress>,

    /// UDP port this node listens for offsets on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Period between measurement cycles.
    #[serde(default = "default_probe_interval", with = "humantime_duration")]
    pub probe_interval: Duration,

    /// Per-probe deadline.
    #[serde(default = "default_probe_timeout", with = "humantime_duration")]
    pub probe_timeout: Duration,

    /// Cache TTL.
    #[serde(default = "default_max_offset_age", with = "humantime_duration")]
    pub max_offset_age: Duration,

    /// Eviction sweep period.
    #[serde(default = "default_eviction_interval", with = "humantime_duration")]
    pub eviction_interval: Duration,

    /// Inter-probe pause within a worker.
    #[serde(default = "default_stagger_delay", with = "humantime_duration")]
    pub stagger_delay: Duration,

    /// TTL for the Publisher's cached self-location.
    #[serde(default = "default_location_ttl", with = "humantime_duration")]
    pub location_ttl: Duration,

    /// TTL for the Publisher's cached slot.
    #[serde(default = "default_slot_ttl", with = "humantime_duration")]
    pub slot_ttl: Duration,

    /// Ed25519 private key material, source-specific format, opaque to core.
    #[serde(default)]
    pub keypair_pkcs8: Vec<u8>,
}

impl Default for GvpConfig {
    fn default() -> Self {
        Self {
            trusted_signers: HashSet::new(),
            peers: Vec::new(),
            listen_port: default_listen_port(),
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
            max_offset_age: default_max_offset_age(),
            eviction_interval: default_eviction_interval(),
            stagger_delay: default_stagger_delay(),
            location_ttl: default_location_ttl(),
            slot_ttl: default_slot_ttl(),
            keypair_pkcs8: Vec::new(),
        }
    }
}

/// Serializes `Duration` as a humantime-style string (e.g. `"5m"`) for the
/// handful of deployments that hand-edit a config file; parsing falls back
/// to plain integer seconds for programmatic callers.
mod humantime_duration {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Seconds(s) => Ok(Duration::from_secs(s)),
            Repr::Text(s) => parse_humantime(&s).map_err(serde::de::Error::custom),
        }
    }

    fn parse_humantime(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let split_at = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit suffix in duration {s:?}"))?;
        let (num, unit) = s.split_at(split_at);
        let num: u64 = num.parse().map_err(|_| format!("invalid duration {s:?}"))?;
        let secs = match unit {
            "ms" => return Ok(Duration::from_millis(num)),
            "s" => num,
            "m" => num * 60,
            "h" => num * 3600,
            _ => return Err(format!("unrecognized duration unit in {s:?}")),
        };
        Ok(Duration::from_secs(secs))
    }
}
