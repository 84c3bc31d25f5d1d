// Copyright (c) 2026 Gvp
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Core protocol primitives: wire types, codec, crypto, cache, and the
//! external source interfaces the rest of the crate consumes.

/// Per-signer TTL cache of received offsets.
pub mod cache;
/// Deterministic binary codec for `LocationOffset`.
pub mod codec;
/// Ed25519 signing and chain verification.
pub mod crypto;
/// External collaborator interfaces (`LocationSource`, `SlotSource`).
pub mod sources;
/// Wire types: `LocationOffset`, `PeerAddress`, size/depth/fanout constants.
pub mod types;
