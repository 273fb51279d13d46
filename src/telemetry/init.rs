// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Subscriber setup for the command line.
//!
//! Logs always go to stderr so report output on stdout stays parseable.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// How much a run logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings only: skipped files, oracle failures, retries.
    #[default]
    Quiet,
    /// Per-file and per-run summaries.
    Verbose,
    /// Per-construct and per-call detail with span timings.
    Debug,
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level used when no filter directive is given and `RUST_LOG` is unset.
    pub level: Level,
    /// Directive such as `tracelint::synth=debug`. Wins over `RUST_LOG`.
    pub filter: Option<String>,
    pub ansi: bool,
    /// Log span close events with their busy and idle time.
    pub span_timing: bool,
    /// Prefix events with module path, file and line.
    pub source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::for_verbosity(Verbosity::Quiet)
    }
}

impl TelemetryConfig {
    pub fn for_verbosity(verbosity: Verbosity) -> Self {
        let (level, detail) = match verbosity {
            Verbosity::Quiet => (Level::WARN, false),
            Verbosity::Verbose => (Level::INFO, false),
            Verbosity::Debug => (Level::DEBUG, true),
        };
        Self {
            level,
            filter: None,
            ansi: true,
            span_timing: detail,
            source_location: detail,
        }
    }

    /// Use `filter` instead of the level and `RUST_LOG`. Blank directives
    /// are ignored.
    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// The filter the subscriber will use. An invalid directive falls back
    /// to the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match &self.filter {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Keep alive for the duration of the program.
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let span_events = if config.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi)
        .with_target(config.source_location)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.env_filter());
    let installed = if config.source_location {
        registry.with(layer).try_init()
    } else {
        registry.with(layer.compact()).try_init()
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TelemetryConfig::default().level, Level::WARN);
        assert_eq!(TelemetryConfig::for_verbosity(Verbosity::Verbose).level, Level::INFO);

        let debug = TelemetryConfig::for_verbosity(Verbosity::Debug);
        assert_eq!(debug.level, Level::DEBUG);
        assert!(debug.span_timing);
        assert!(debug.source_location);
        assert!(!TelemetryConfig::default().source_location);
    }

    #[test]
    fn test_filter_directive() {
        let config = TelemetryConfig::default()
            .with_filter(Some(" tracelint::synth=debug "))
            .with_ansi(false);
        assert_eq!(config.filter.as_deref(), Some("tracelint::synth=debug"));
        assert!(!config.ansi);
        assert_eq!(config.env_filter().max_level_hint(), Some(LevelFilter::DEBUG));

        assert!(TelemetryConfig::default().with_filter(Some("  ")).filter.is_none());
        assert!(TelemetryConfig::default().with_filter(None).filter.is_none());
    }

    #[test]
    fn test_invalid_filter_falls_back_to_level() {
        let config = TelemetryConfig::for_verbosity(Verbosity::Verbose)
            .with_filter(Some("tracelint=loud"));
        assert_eq!(config.env_filter().max_level_hint(), Some(LevelFilter::INFO));
    }
}
