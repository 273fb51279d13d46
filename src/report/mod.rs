// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Findings, deduplication, and run reports.
//!
//! The report carries everything a presenter needs (path, line, severity,
//! message, fixes, rule references, confidence); nothing here prints.

pub mod dedup;
pub mod finding;
mod summary;

pub use dedup::{combine_confidence, reduce, report_order, CONFIDENCE_CAP};
pub use finding::{Finding, FindingOrigin, Location, Related, RuleCategory, Severity};
pub use summary::Summary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::synth::SynthesisStats;

/// Deduplicated findings for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub language: String,
    pub findings: Vec<Finding>,
    /// Call sites the extractor could not read.
    pub skipped_sites: usize,
    pub stats: SynthesisStats,
}

impl FileReport {
    /// Report for `findings` after duplicate merging and ordering.
    pub fn new(
        path: impl Into<String>,
        language: impl Into<String>,
        findings: Vec<Finding>,
        skipped_sites: usize,
        stats: SynthesisStats,
    ) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            findings: reduce(findings),
            skipped_sites,
            stats,
        }
    }
}

/// A file that was not analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Result of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
    pub skipped: Vec<SkippedFile>,
    pub summary: Summary,
    /// The run stopped before every candidate was evaluated.
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(
        mut files: Vec<FileReport>,
        skipped: Vec<SkippedFile>,
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let summary = Summary::from_files(&files, skipped.len());
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            files,
            skipped,
            summary,
            cancelled,
        }
    }

    /// All findings, file by file.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.files.iter().flat_map(|f| f.findings.iter())
    }

    /// Drop findings below `threshold`; placeholders are always kept.
    pub fn apply_threshold(&mut self, threshold: f32) {
        if threshold <= 0.0 {
            return;
        }
        for file in &mut self.files {
            file.findings = filter_by_confidence(std::mem::take(&mut file.findings), threshold);
        }
        self.summary = Summary::from_files(&self.files, self.skipped.len());
    }

    /// Whether any finding is at or above `severity`.
    pub fn fails_on(&self, severity: Severity) -> bool {
        self.findings().any(|f| f.severity >= severity)
    }

    pub fn stats(&self) -> &SynthesisStats {
        &self.summary.stats
    }
}

/// Findings at or above `threshold`, plus every placeholder.
pub fn filter_by_confidence(findings: Vec<Finding>, threshold: f32) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| f.is_placeholder() || f.confidence >= threshold)
        .collect()
}
