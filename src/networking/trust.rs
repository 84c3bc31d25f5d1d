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

//! Admits incoming offsets into the cache only after checking the signer
//! against the trusted set and verifying the whole chain (`spec.md` §4.7).

use crate::core::cache::OffsetCache;
use crate::core::crypto;
use crate::core::types::LocationOffset;
use crate::monitoring::metrics::Metrics;
use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Filters incoming offsets by signer trust and signature validity before
/// they reach the cache. The trusted set is replaced atomically as a whole
/// (`spec.md` §3.5/§9), never mutated entry-by-entry.
pub struct TrustFilter {
    trusted_signers: RwLock<HashSet<[u8; 32]>>,
}

impl TrustFilter {
    /// Build a filter over an initial set of trusted authority public keys.
    pub fn new(trusted_signers: HashSet<[u8; 32]>) -> Self {
        Self {
            trusted_signers: RwLock::new(trusted_signers),
        }
    }

    /// Atomically replace the whole trusted set.
    pub async fn replace_trusted(&self, new: HashSet<[u8; 32]>) {
        *self.trusted_signers.write().await = new;
    }

    /// Whether `pubkey` is currently in the trusted set.
    pub async fn is_trusted(&self, pubkey: &[u8; 32]) -> bool {
        self.trusted_signers.read().await.contains(pubkey)
    }

    /// Admit `offset`, received from `sender`, into `cache` iff its root
    /// signer is trusted and the whole chain verifies. Steps match
    /// `spec.md` §4.7 exactly: an untrusted signer is dropped silently
    /// (debug log only, but counted); a failed chain verification is logged
    /// at `warn` with the signer, the sender address, and the offending
    /// chain depth, and counted; only then is the offset written into the
    /// cache.
    pub async fn admit(
        &self,
        offset: LocationOffset,
        sender: SocketAddr,
        cache: &OffsetCache,
        metrics: &Metrics,
    ) {
        if !self.trusted_signers.read().await.contains(&offset.authority_pubkey) {
            debug!(
                signer = %hex::encode(offset.authority_pubkey),
                %sender,
                "dropping offset from untrusted signer"
            );
            metrics.untrusted_drops_total.inc();
            return;
        }

        if let Err(crypto::CryptoError::SignatureInvalid(depth)) = crypto::verify_chain(&offset) {
            warn!(
                signer = %hex::encode(offset.authority_pubkey),
                %sender,
                depth,
                "dropping offset that failed chain verification"
            );
            metrics.verification_failures_total.inc();
            return;
        }

        debug!(
            signer = %hex::encode(offset.authority_pubkey),
            %sender,
            slot = offset.measurement_slot,
            rtt_ns = offset.rtt_ns,
            "admitting offset into cache"
        );
        metrics.offsets_admitted_total.inc();
        cache.put(offset);
    }
}
