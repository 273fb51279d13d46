// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::synth::SynthesisStats;

use super::finding::{RuleCategory, Severity};
use super::FileReport;

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub findings: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    /// A merged finding counts once for each of its categories.
    pub by_category: BTreeMap<RuleCategory, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub placeholders: usize,
    pub skipped_sites: usize,
    pub stats: SynthesisStats,
}

impl Summary {
    pub fn from_files(files: &[FileReport], files_skipped: usize) -> Self {
        let mut summary = Self {
            files_analyzed: files.len(),
            files_skipped,
            ..Default::default()
        };
        for file in files {
            summary.stats.merge(&file.stats);
            summary.skipped_sites += file.skipped_sites;
            for finding in &file.findings {
                summary.findings += 1;
                *summary.by_severity.entry(finding.severity).or_insert(0) += 1;
                *summary.by_language.entry(finding.language.clone()).or_insert(0) += 1;
                for category in &finding.categories {
                    *summary.by_category.entry(*category).or_insert(0) += 1;
                }
                if finding.is_placeholder() {
                    summary.placeholders += 1;
                }
            }
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// One-line description such as `3 findings (1 high, 2 medium) in 4 files`.
    pub fn headline(&self) -> String {
        let parts: Vec<String> = Severity::ALL
            .iter()
            .filter(|s| self.count(**s) > 0)
            .map(|s| format!("{} {}", self.count(*s), s))
            .collect();
        let noun = if self.findings == 1 { "finding" } else { "findings" };
        let files = if self.files_analyzed == 1 { "file" } else { "files" };
        if parts.is_empty() {
            format!("0 findings in {} {}", self.files_analyzed, files)
        } else {
            format!(
                "{} {} ({}) in {} {}",
                self.findings,
                noun,
                parts.join(", "),
                self.files_analyzed,
                files
            )
        }
    }
}
