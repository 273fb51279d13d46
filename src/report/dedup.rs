// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Duplicate merging, confidence scoring and output ordering.
//!
//! Two findings are duplicates when they reference the same construct or
//! scope (same path and start offset) and share a category. Grouping uses
//! connected components, so `A~B` and `B~C` merge all three even when `A`
//! and `C` share nothing directly, and the result does not depend on input
//! order. Contributors are put in a canonical order before merging so the
//! noisy-OR product is evaluated the same way every time.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::finding::Finding;

/// Merged confidence never reaches certainty.
pub const CONFIDENCE_CAP: f32 = 0.99;

/// Merge duplicates and order the result deterministically.
pub fn reduce(findings: Vec<Finding>) -> Vec<Finding> {
    let start = Instant::now();

    let mut groups: BTreeMap<(String, usize), Vec<Finding>> = BTreeMap::new();
    for f in findings {
        groups
            .entry((f.path.clone(), f.location.offset))
            .or_default()
            .push(f);
    }

    let mut out = Vec::new();
    for (_, group) in groups {
        out.extend(components(group).into_iter().filter_map(merge));
    }
    out.sort_by(report_order);

    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.record_operation("report.reduce", start.elapsed());
    #[cfg(not(feature = "telemetry"))]
    let _ = start;

    out
}

/// `1 - prod(1 - c)`, capped; a single confidence is returned unchanged.
pub fn combine_confidence(confidences: &[f32]) -> f32 {
    match confidences {
        [] => 0.0,
        [only] => *only,
        many => {
            let miss: f32 = many.iter().map(|c| 1.0 - c.clamp(0.0, 1.0)).product();
            (1.0 - miss).min(CONFIDENCE_CAP)
        }
    }
}

/// Severity descending, then position, then category names, then message.
pub fn report_order(a: &Finding, b: &Finding) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.location.line.cmp(&b.location.line))
        .then_with(|| a.location.column.cmp(&b.location.column))
        .then_with(|| a.category_label().cmp(&b.category_label()))
        .then_with(|| a.message.cmp(&b.message))
}

/// Split findings at one reference into groups linked by shared categories.
fn components(group: Vec<Finding>) -> Vec<Vec<Finding>> {
    let n = group.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in i + 1..n {
            if group[i].categories.iter().any(|c| group[j].categories.contains(c)) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut by_root: BTreeMap<usize, Vec<Finding>> = BTreeMap::new();
    for (i, f) in group.into_iter().enumerate() {
        let root = find(&mut parent, i);
        by_root.entry(root).or_default().push(f);
    }
    by_root.into_values().collect()
}

/// Total order on finding content: strongest contributor first.
fn canonical_order(a: &Finding, b: &Finding) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.severity.cmp(&a.severity))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.categories.cmp(&b.categories))
        .then_with(|| a.fixes.cmp(&b.fixes))
        .then_with(|| a.rule_refs.cmp(&b.rule_refs))
        .then_with(|| a.subjects.cmp(&b.subjects))
        .then_with(|| a.related.cmp(&b.related))
        .then_with(|| a.function.cmp(&b.function))
        .then_with(|| a.snippet.cmp(&b.snippet))
        .then_with(|| a.origin.cmp(&b.origin))
}

fn merge(mut contributors: Vec<Finding>) -> Option<Finding> {
    contributors.sort_by(canonical_order);
    let confidences: Vec<f32> = contributors.iter().map(|f| f.confidence).collect();
    let confidence = combine_confidence(&confidences);

    let mut iter = contributors.into_iter();
    let mut merged = iter.next()?;
    for other in iter {
        merged.categories.extend(other.categories);
        for fix in other.fixes {
            if !merged.fixes.contains(&fix) {
                merged.fixes.push(fix);
            }
        }
        merged.rule_refs.extend(other.rule_refs);
        merged.subjects.extend(other.subjects);
        merged.related.extend(other.related);
        merged.severity = merged.severity.max(other.severity);
        if merged.function.is_none() {
            merged.function = other.function;
        }
        if merged.snippet.is_empty() {
            merged.snippet = other.snippet;
        }
    }

    merged.categories.sort();
    merged.categories.dedup();
    merged.rule_refs.sort();
    merged.rule_refs.dedup();
    merged.subjects.sort();
    merged.subjects.dedup();
    merged.related.sort();
    merged.related.dedup();
    merged.confidence = confidence;
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::finding::{Location, RuleCategory, Severity};

    fn finding(offset: usize, category: RuleCategory, confidence: f32, message: &str) -> Finding {
        Finding::new(
            "svc/handler.go",
            "go",
            Location {
                line: offset / 10 + 1,
                column: 1,
                offset,
            },
            category,
            message,
        )
        .with_confidence(confidence)
    }

    #[test]
    fn test_combine_confidence() {
        assert_eq!(combine_confidence(&[]), 0.0);
        assert_eq!(combine_confidence(&[0.7]), 0.7);
        assert!((combine_confidence(&[0.5, 0.5]) - 0.75).abs() < 1e-6);
        assert_eq!(combine_confidence(&[0.95, 0.95, 0.95]), CONFIDENCE_CAP);
    }

    #[test]
    fn test_duplicates_merge() {
        let a = finding(10, RuleCategory::NamingConvention, 0.6, "camelCase name")
            .with_fix("rename to \"process user data\"")
            .with_rule_ref("r1")
            .with_severity(Severity::Low);
        let b = finding(10, RuleCategory::NamingConvention, 0.8, "name is not verb object")
            .with_fix("use verb object")
            .with_rule_ref("r2")
            .with_severity(Severity::Medium);

        let out = reduce(vec![a, b]);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        assert_eq!(merged.message, "name is not verb object");
        assert_eq!(merged.severity, Severity::Medium);
        assert_eq!(merged.fixes.len(), 2);
        assert_eq!(merged.rule_refs, vec!["r1".to_string(), "r2".to_string()]);
        assert!((merged.confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn test_different_category_or_reference_stays_separate() {
        let out = reduce(vec![
            finding(10, RuleCategory::NamingConvention, 0.6, "a"),
            finding(10, RuleCategory::BoundaryViolation, 0.6, "b"),
            finding(20, RuleCategory::NamingConvention, 0.6, "c"),
        ]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_transitive_grouping() {
        let mut ab = finding(10, RuleCategory::NamingConvention, 0.5, "ab");
        ab.categories.push(RuleCategory::HighCardinality);
        let b = finding(10, RuleCategory::HighCardinality, 0.5, "b");
        let a = finding(10, RuleCategory::NamingConvention, 0.5, "a");
        let out = reduce(vec![a, b, ab]);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].categories,
            vec![RuleCategory::NamingConvention, RuleCategory::HighCardinality]
        );
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = finding(10, RuleCategory::LoopBody, 0.3, "one").with_fix("x");
        let b = finding(10, RuleCategory::LoopBody, 0.7, "two").with_fix("y");
        let c = finding(10, RuleCategory::LoopBody, 0.45, "three").with_fix("z");

        let forward = reduce(vec![a.clone(), b.clone(), c.clone()]);
        let backward = reduce(vec![c, b, a]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_ordering() {
        let out = reduce(vec![
            finding(50, RuleCategory::OrphanTelemetryCall, 0.4, "orphan"),
            finding(30, RuleCategory::LoopBody, 0.8, "loop"),
            finding(90, RuleCategory::UnterminatedSpan, 0.9, "open"),
            finding(10, RuleCategory::BoundaryViolation, 0.8, "internal"),
        ]);
        let messages: Vec<_> = out.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["open", "internal", "loop", "orphan"]);
    }
}
