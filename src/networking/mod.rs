// Copyright (c) 2026 Gvp
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: UDP transport, RTT probing, composite-offset publishing, the
//! incoming trust filter, and the receive loop that ties them together.

/// Minimal two-way echo implementing `prober::EchoClient` over UDP.
pub mod echo;
/// Bounded-worker-pool RTT measurement over the peer set.
pub mod prober;
/// Builds and sends signed composite offsets.
pub mod publisher;
/// Single-task loop pulling datagrams off the listening socket.
pub mod receiver;
/// UDP datagram send/receive primitives.
pub mod transport;
/// Trust-gated admission of incoming offsets into the cache.
pub mod trust;
