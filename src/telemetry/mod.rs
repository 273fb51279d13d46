// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging and metrics.
//!
//! - **Logging**: `tracing` events, written to stderr by the subscriber
//!   installed with [`init_telemetry`]
//! - **Metrics**: [`GLOBAL_METRICS`] timings and counters, compiled in with
//!   the `telemetry` feature
//!
//! ```rust,ignore
//! use tracelint::telemetry::{init_telemetry, TelemetryConfig, Verbosity};
//!
//! let config = TelemetryConfig::for_verbosity(Verbosity::Verbose)
//!     .with_filter(Some("tracelint::synth=debug"));
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! Log levels: `debug!` for per-construct and per-call detail, `info!` for
//! per-file and per-run summaries, `warn!` for skipped call sites, oracle
//! failures, retries and timeouts.

mod init;
pub mod metrics;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard, Verbosity};
pub use metrics::{
    Histogram, Metrics, MetricsSnapshot, OperationMetrics, OracleMetrics, GLOBAL_METRICS,
};
