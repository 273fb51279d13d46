// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Oracle call policy: timeouts, bounded retries, cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::OracleError;

/// Shared stop signal for a run.
///
/// Once set, no new oracle call starts. Calls already in flight are left
/// to finish or time out.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Oracle activity for one file or run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisStats {
    /// Candidate issues considered.
    pub candidates: usize,
    /// Oracle calls made, retries not included.
    pub calls: usize,
    /// Calls that still failed after retries.
    pub failures: usize,
    /// Judgment calls, a subset of `calls`.
    pub judge_calls: usize,
    pub judge_failures: usize,
    pub retries: usize,
    /// Attempts that hit the timeout.
    pub timeouts: usize,
    /// Candidates skipped because the run was cancelled.
    pub cancelled: usize,
}

impl SynthesisStats {
    pub fn merge(&mut self, other: &SynthesisStats) {
        self.candidates += other.candidates;
        self.calls += other.calls;
        self.failures += other.failures;
        self.judge_calls += other.judge_calls;
        self.judge_failures += other.judge_failures;
        self.retries += other.retries;
        self.timeouts += other.timeouts;
        self.cancelled += other.cancelled;
    }

    /// Every oracle call failed, or judgments were requested and none came back.
    pub fn all_failed(&self) -> bool {
        (self.calls > 0 && self.failures == self.calls)
            || (self.judge_calls > 0 && self.judge_failures == self.judge_calls)
    }

    pub(crate) fn record_call(&mut self, record: &CallRecord, failed: bool) {
        self.calls += 1;
        self.retries += record.retries;
        self.timeouts += record.timeouts;
        if failed {
            self.failures += 1;
        }
    }

    pub(crate) fn record_judge_call(&mut self, record: &CallRecord, failed: bool) {
        self.record_call(record, failed);
        self.judge_calls += 1;
        if failed {
            self.judge_failures += 1;
        }
    }
}

/// What happened during one logical call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallRecord {
    pub attempts: usize,
    pub retries: usize,
    pub timeouts: usize,
}

/// Timeout, retry and concurrency limits for oracle calls.
#[derive(Debug, Clone)]
pub struct OraclePolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before retry `n` is `n * backoff`.
    pub backoff: Duration,
    pub max_concurrency: usize,
}

impl Default for OraclePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            max_retries: 2,
            backoff: Duration::from_millis(250),
            max_concurrency: 4,
        }
    }
}

impl OraclePolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run `op` under the timeout, retrying retryable failures.
    ///
    /// Returns `Cancelled` without calling `op` when the flag is already
    /// set. A cancellation that arrives between attempts stops retrying and
    /// returns the last error.
    pub async fn call<T, F, Fut>(
        &self,
        oracle: &str,
        cancel: &CancellationFlag,
        mut op: F,
    ) -> (Result<T, OracleError>, CallRecord)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut record = CallRecord::default();
        if cancel.is_cancelled() {
            return (Err(OracleError::Cancelled), record);
        }

        let start = Instant::now();
        let timeout_ms = self.timeout.as_millis() as u64;
        loop {
            record.attempts += 1;
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => {
                    record.timeouts += 1;
                    #[cfg(feature = "telemetry")]
                    GLOBAL_METRICS.increment_counter("oracle.timeout");
                    Err(OracleError::Timeout { timeout_ms })
                }
            };

            match result {
                Ok(value) => {
                    #[cfg(feature = "telemetry")]
                    GLOBAL_METRICS.record_oracle(oracle, start.elapsed(), true);
                    #[cfg(not(feature = "telemetry"))]
                    let _ = start;
                    return (Ok(value), record);
                }
                Err(err)
                    if err.is_retryable()
                        && record.retries < self.max_retries as usize
                        && !cancel.is_cancelled() =>
                {
                    record.retries += 1;
                    warn!(oracle, attempt = record.attempts, error = %err, "Oracle call failed, retrying");
                    #[cfg(feature = "telemetry")]
                    GLOBAL_METRICS.increment_counter("oracle.retry");
                    tokio::time::sleep(self.backoff * record.retries as u32).await;
                }
                Err(err) => {
                    warn!(oracle, attempts = record.attempts, error = %err, "Oracle call failed");
                    #[cfg(feature = "telemetry")]
                    {
                        GLOBAL_METRICS.increment_counter("oracle.failure");
                        GLOBAL_METRICS.record_oracle(oracle, start.elapsed(), false);
                    }
                    return (Err(err), record);
                }
            }
        }
    }
}
