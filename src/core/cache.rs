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

//! Per-signer, TTL-evicted cache of received `LocationOffset`s.
//!
//! Backed by `dashmap` so readers and writers on different keys proceed
//! independently — the cache is the only shared mutable state in the
//! system besides sockets, and `spec.md` §5/§9 rule out a single coarse
//! lock serializing unrelated signers.

use super::types::LocationOffset;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// One cached attestation plus the monotonic instant it was received.
#[derive(Clone, Debug)]
struct CacheEntry {
    offset: LocationOffset,
    received_at: Instant,
}

/// Concurrent, per-signer TTL cache. At most one entry per `authority_pubkey`;
/// a new `put` always overwrites the prior entry for that signer regardless
/// of content (§3.3).
pub struct OffsetCache {
    entries: DashMap<[u8; 32], CacheEntry>,
    max_age: Duration,
}

impl OffsetCache {
    /// Create an empty cache with the given TTL.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_age,
        }
    }

    /// Insert or overwrite the entry keyed by `offset.authority_pubkey`.
    pub fn put(&self, offset: LocationOffset) {
        let key = offset.authority_pubkey;
        self.entries.insert(
            key,
            CacheEntry {
                offset,
                received_at: Instant::now(),
            },
        );
    }

    /// Return the entry for `pubkey` iff its age is within the TTL.
    /// Expired entries are left in place (not mutated here); `evict` reaps them.
    pub fn get(&self, pubkey: &[u8; 32]) -> Option<LocationOffset> {
        let entry = self.entries.get(pubkey)?;
        if entry.received_at.elapsed() > self.max_age {
            return None;
        }
        Some(entry.offset.clone())
    }

    /// Return a copy of the non-expired entry with the smallest `rtt_ns`.
    /// Ties are broken arbitrarily (iteration order). `None` if nothing valid.
    pub fn get_best(&self) -> Option<LocationOffset> {
        let max_age = self.max_age;
        self.entries
            .iter()
            .filter(|e| e.received_at.elapsed() <= max_age)
            .min_by_key(|e| e.offset.rtt_ns)
            .map(|e| e.offset.clone())
    }

    /// Remove all entries whose age exceeds the TTL. Returns the count removed.
    pub fn evict(&self) -> usize {
        let max_age = self.max_age;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.received_at.elapsed() <= max_age);
        before - self.entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(pubkey: [u8; 32], rtt_ns: u64) -> LocationOffset {
        LocationOffset {
            signature: [0u8; 64],
            authority_pubkey: pubkey,
            measurement_slot: 1,
            lat: 0.0,
            lng: 0.0,
            measured_rtt_ns: rtt_ns,
            rtt_ns,
            references: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn put_then_get_returns_the_entry() {
        let cache = OffsetCache::new(Duration::from_secs(3600));
        cache.put(offset([1u8; 32], 1000));
        assert!(cache.get(&[1u8; 32]).is_some());
        assert!(cache.get(&[2u8; 32]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_max_age_and_evict_reaps_it() {
        let cache = OffsetCache::new(Duration::from_secs(60));
        cache.put(offset([1u8; 32], 1000));

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.get(&[1u8; 32]).is_none());
        assert_eq!(cache.evict(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn get_best_returns_minimum_rtt_among_non_expired() {
        let cache = OffsetCache::new(Duration::from_secs(60));
        cache.put(offset([1u8; 32], 5000));
        cache.put(offset([2u8; 32], 1000));
        cache.put(offset([3u8; 32], 9000));

        let best = cache.get_best().unwrap();
        assert_eq!(best.authority_pubkey, [2u8; 32]);
    }

    #[tokio::test(start_paused = true)]
    async fn get_best_skips_an_expired_minimum() {
        let cache = OffsetCache::new(Duration::from_secs(60));
        cache.put(offset([1u8; 32], 1000)); // will expire
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put(offset([2u8; 32], 5000)); // fresh, higher rtt

        let best = cache.get_best().unwrap();
        assert_eq!(best.authority_pubkey, [2u8; 32]);
    }

    #[tokio::test(start_paused = true)]
    async fn new_insertion_replaces_the_prior_entry_for_the_same_signer() {
        let cache = OffsetCache::new(Duration::from_secs(60));
        cache.put(offset([1u8; 32], 5000));
        cache.put(offset([1u8; 32], 1000));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&[1u8; 32]).unwrap().rtt_ns, 1000);
    }
}
