// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for analysis runs.
//!
//! Lightweight in-process metrics: operation timings, per-oracle call
//! outcomes, named event counters, and token usage. Nothing is exported;
//! the CLI prints a snapshot with `--metrics`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Serialize;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Call outcomes per oracle (`retrieval`, `judge`).
    oracles: RwLock<BTreeMap<String, OracleMetrics>>,

    /// Timed operations.
    operations: RwLock<BTreeMap<String, OperationMetrics>>,

    /// Countable events such as retries and skipped call sites.
    counters: RwLock<BTreeMap<String, u64>>,

    tokens: TokenMetrics,

    start_time: Instant,
}

// A panic while holding a metrics lock leaves plain counters behind; keep using them.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            oracles: RwLock::new(BTreeMap::new()),
            operations: RwLock::new(BTreeMap::new()),
            counters: RwLock::new(BTreeMap::new()),
            tokens: TokenMetrics::new(),
            start_time: Instant::now(),
        }
    }

    /// Record one oracle call.
    pub fn record_oracle(&self, name: &str, duration: Duration, success: bool) {
        let mut oracles = write(&self.oracles);
        oracles
            .entry(name.to_string())
            .or_insert_with(OracleMetrics::new)
            .record(duration, success);
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        let mut ops = write(&self.operations);
        ops.entry(name.to_string())
            .or_insert_with(OperationMetrics::new)
            .record(duration);
    }

    /// Bump a named counter by one.
    pub fn increment_counter(&self, name: &str) {
        self.add_to_counter(name, 1);
    }

    pub fn add_to_counter(&self, name: &str, amount: u64) {
        let mut counters = write(&self.counters);
        *counters.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn record_tokens(&self, input: u64, output: u64) {
        self.tokens.add_input(input);
        self.tokens.add_output(output);
    }

    pub fn oracle_metrics(&self, name: &str) -> Option<OracleMetrics> {
        read(&self.oracles).get(name).cloned()
    }

    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        read(&self.operations).get(name).cloned()
    }

    pub fn counter(&self, name: &str) -> u64 {
        read(&self.counters).get(name).copied().unwrap_or(0)
    }

    pub fn token_counts(&self) -> (u64, u64) {
        (self.tokens.input_total(), self.tokens.output_total())
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            oracles: read(&self.oracles).clone(),
            operations: read(&self.operations).clone(),
            counters: read(&self.counters).clone(),
            input_tokens: self.tokens.input_total(),
            output_tokens: self.tokens.output_total(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        write(&self.oracles).clear();
        write(&self.operations).clear();
        write(&self.counters).clear();
        self.tokens.reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Call outcomes for one oracle.
#[derive(Debug, Clone, Serialize)]
pub struct OracleMetrics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl OracleMetrics {
    pub fn new() -> Self {
        Self {
            calls: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.calls += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.calls as u32
        }
    }

    /// Success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            1.0
        } else {
            self.successes as f64 / self.calls as f64
        }
    }
}

impl Default for OracleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation timings with a latency histogram.
#[derive(Debug, Clone, Serialize)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    /// Bucket boundaries in microseconds.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Approximate percentile, reported as the bucket's upper boundary.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_micros(micros);
            }
        }

        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us, 1ms, 10ms, 100ms, 1s, 10s
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

#[derive(Debug)]
struct TokenMetrics {
    input: AtomicU64,
    output: AtomicU64,
}

impl TokenMetrics {
    fn new() -> Self {
        Self {
            input: AtomicU64::new(0),
            output: AtomicU64::new(0),
        }
    }

    fn add_input(&self, count: u64) {
        self.input.fetch_add(count, Ordering::Relaxed);
    }

    fn add_output(&self, count: u64) {
        self.output.fetch_add(count, Ordering::Relaxed);
    }

    fn input_total(&self) -> u64 {
        self.input.load(Ordering::Relaxed)
    }

    fn output_total(&self) -> u64 {
        self.output.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.input.store(0, Ordering::Relaxed);
        self.output.store(0, Ordering::Relaxed);
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub oracles: BTreeMap<String, OracleMetrics>,
    pub operations: BTreeMap<String, OperationMetrics>,
    pub counters: BTreeMap<String, u64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Tokens: {} input, {} output\n\n",
            self.input_tokens, self.output_tokens
        ));

        if !self.oracles.is_empty() {
            report.push_str("Oracle Calls:\n");
            for (name, metrics) in &self.oracles {
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% success, avg {:.2?}\n",
                    name,
                    metrics.calls,
                    metrics.success_rate() * 100.0,
                    metrics.avg_duration()
                ));
            }
            report.push('\n');
        }

        if !self.operations.is_empty() {
            report.push_str("Operation Metrics:\n");
            for (name, metrics) in &self.operations {
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.p99()
                ));
            }
            report.push('\n');
        }

        if !self.counters.is_empty() {
            report.push_str("Counters:\n");
            for (name, value) in &self.counters {
                report.push_str(&format!("  {}: {}\n", name, value));
            }
        }

        report
    }
}

/// Record an operation to global metrics.
pub fn record_operation(name: &str, duration: Duration) {
    GLOBAL_METRICS.record_operation(name, duration);
}

/// Bump a counter in global metrics.
pub fn increment_counter(name: &str) {
    GLOBAL_METRICS.increment_counter(name);
}
