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

//! External collaborator interfaces the core consumes but does not implement
//! (`spec.md` §1, §6.4): resolving this node's own lat/lng is a
//! service-registry lookup, and resolving the current slot is a ledger RPC
//! call. Both are out of scope here; only the trait boundary lives in this
//! crate.

use async_trait::async_trait;
use thiserror::Error;

/// Error a source collaborator may report. Opaque beyond "unavailable":
/// the caller's only recourse is falling back to a cached value.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("source unavailable")]
pub struct SourceError;

/// Resolves this node's own geographic coordinates.
///
/// Implementations may perform network I/O and must be safe to call
/// concurrently from multiple tasks.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Return `(lat, lng)` in WGS84 degrees.
    async fn get_self_location(&self) -> Result<(f64, f64), SourceError>;
}

/// Resolves the current blockchain slot, used as a coarse monotonic clock.
///
/// Implementations may perform network I/O and must be safe to call
/// concurrently from multiple tasks.
#[async_trait]
pub trait SlotSource: Send + Sync {
    /// Return the current slot number.
    async fn current_slot(&self) -> Result<u64, SourceError>;
}
