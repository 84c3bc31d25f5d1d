// Copyright (c) 2026 Gvp
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Observability: structured logging setup lives at the binary entry point
//! (`src/main.rs`); this module holds the in-process metrics registry.

/// Prometheus counters and gauges.
pub mod metrics;
