// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Finding value types.

use serde::{Deserialize, Serialize};

/// Finding severity, totally ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Lenient parse used for oracle answers.
    pub fn parse_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "info" | "minor" => Some(Self::Low),
            "medium" | "moderate" | "warning" | "warn" => Some(Self::Medium),
            "high" | "critical" | "error" | "major" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s).ok_or_else(|| format!("unknown severity: {}", s))
    }
}

/// What kind of defect a finding reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    NamingConvention,
    AttributeNaming,
    EventNaming,
    MetricNaming,
    BoundaryViolation,
    HighCardinality,
    LoopBody,
    DuplicateErrorRecording,
    NamingInconsistency,
    SensitiveAttribute,
    SpanKindMisuse,
    UnterminatedSpan,
    OrphanTelemetryCall,
    UnmatchedSpanEnd,
    JudgmentUnavailable,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 15] = [
        Self::NamingConvention,
        Self::AttributeNaming,
        Self::EventNaming,
        Self::MetricNaming,
        Self::BoundaryViolation,
        Self::HighCardinality,
        Self::LoopBody,
        Self::DuplicateErrorRecording,
        Self::NamingInconsistency,
        Self::SensitiveAttribute,
        Self::SpanKindMisuse,
        Self::UnterminatedSpan,
        Self::OrphanTelemetryCall,
        Self::UnmatchedSpanEnd,
        Self::JudgmentUnavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NamingConvention => "naming-convention",
            Self::AttributeNaming => "attribute-naming",
            Self::EventNaming => "event-naming",
            Self::MetricNaming => "metric-naming",
            Self::BoundaryViolation => "boundary-violation",
            Self::HighCardinality => "high-cardinality",
            Self::LoopBody => "loop-body",
            Self::DuplicateErrorRecording => "duplicate-error-recording",
            Self::NamingInconsistency => "naming-inconsistency",
            Self::SensitiveAttribute => "sensitive-attribute",
            Self::SpanKindMisuse => "span-kind-misuse",
            Self::UnterminatedSpan => "unterminated-span",
            Self::OrphanTelemetryCall => "orphan-telemetry-call",
            Self::UnmatchedSpanEnd => "unmatched-span-end",
            Self::JudgmentUnavailable => "judgment-unavailable",
        }
    }

    /// Reported from structure alone, without asking the judge.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnterminatedSpan | Self::OrphanTelemetryCall | Self::UnmatchedSpanEnd
        )
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::UnterminatedSpan | Self::HighCardinality | Self::SensitiveAttribute => Severity::High,
            Self::BoundaryViolation
            | Self::LoopBody
            | Self::DuplicateErrorRecording
            | Self::NamingConvention
            | Self::NamingInconsistency
            | Self::SpanKindMisuse => Severity::Medium,
            Self::AttributeNaming
            | Self::EventNaming
            | Self::MetricNaming
            | Self::OrphanTelemetryCall
            | Self::UnmatchedSpanEnd
            | Self::JudgmentUnavailable => Severity::Low,
        }
    }

    /// Short phrase describing the issue, used in retrieval queries.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NamingConvention => "span name convention verb object camelCase snake_case",
            Self::AttributeNaming => "attribute key naming lowercase dotted namespace",
            Self::EventNaming => "span event name",
            Self::MetricNaming => "metric instrument name dotted lowercase service prefix",
            Self::BoundaryViolation => "span on internal helper function not a service boundary",
            Self::HighCardinality => "high cardinality dynamic span name attribute key identifiers",
            Self::LoopBody => "span created inside loop per iteration",
            Self::DuplicateErrorRecording => "record error once duplicate error recording caller returns error",
            Self::NamingInconsistency => "consistent attribute keys same concept different spelling",
            Self::SensitiveAttribute => "sensitive data personal data secrets in attributes",
            Self::SpanKindMisuse => "span kind server consumer internal role",
            Self::UnterminatedSpan => "every span must end unterminated span lifecycle",
            Self::OrphanTelemetryCall => "telemetry call needs an active span",
            Self::UnmatchedSpanEnd => "span end without start lifecycle",
            Self::JudgmentUnavailable => "judgment unavailable",
        }
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position in a source file. `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Another code location involved in a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Related {
    pub location: Location,
    pub note: String,
}

/// How a finding was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingOrigin {
    Judged,
    Structural,
    Placeholder,
}

/// One reported instrumentation defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub path: String,
    pub language: String,
    pub location: Location,
    /// Sorted, non-empty.
    pub categories: Vec<RuleCategory>,
    pub message: String,
    pub fixes: Vec<String>,
    pub severity: Severity,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// Ids of the rule passages that grounded the finding.
    pub rule_refs: Vec<String>,
    /// Names the finding is about (span names, attribute keys).
    pub subjects: Vec<String>,
    pub related: Vec<Related>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub snippet: String,
    pub origin: FindingOrigin,
}

impl Finding {
    pub fn new(
        path: impl Into<String>,
        language: impl Into<String>,
        location: Location,
        category: RuleCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            location,
            categories: vec![category],
            message: message.into(),
            fixes: Vec::new(),
            severity: category.default_severity(),
            confidence: 0.0,
            rule_refs: Vec::new(),
            subjects: Vec::new(),
            related: Vec::new(),
            function: None,
            snippet: String::new(),
            origin: if category == RuleCategory::JudgmentUnavailable {
                FindingOrigin::Placeholder
            } else if category.is_structural() {
                FindingOrigin::Structural
            } else {
                FindingOrigin::Judged
            },
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Clamped to `[0, 1]`; NaN becomes 0.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        let fix = fix.into();
        if !fix.trim().is_empty() && !self.fixes.contains(&fix) {
            self.fixes.push(fix);
        }
        self
    }

    pub fn with_rule_ref(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.rule_refs.contains(&id) {
            self.rule_refs.push(id);
        }
        self
    }

    pub fn with_subjects(mut self, subjects: impl IntoIterator<Item = String>) -> Self {
        for s in subjects {
            if !self.subjects.contains(&s) {
                self.subjects.push(s);
            }
        }
        self
    }

    pub fn with_related(mut self, related: impl IntoIterator<Item = Related>) -> Self {
        self.related.extend(related);
        self.related.sort();
        self.related.dedup();
        self
    }

    pub fn with_function(mut self, function: Option<String>) -> Self {
        self.function = function;
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn has_category(&self, category: RuleCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Placeholders are kept regardless of confidence filters.
    pub fn is_placeholder(&self) -> bool {
        self.origin == FindingOrigin::Placeholder
    }

    /// Comma-joined category names.
    pub fn category_label(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location {
            line: 3,
            column: 5,
            offset: 40,
        }
    }

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Low < Severity::Medium && Severity::Medium < Severity::High);
        assert_eq!(Severity::parse_loose("CRITICAL"), Some(Severity::High));
        assert_eq!(Severity::parse_loose("warning"), Some(Severity::Medium));
        assert_eq!(Severity::parse_loose("info"), Some(Severity::Low));
        assert_eq!(Severity::parse_loose("whatever"), None);
    }

    #[test]
    fn test_category_serde_is_kebab_case() {
        let json = serde_json::to_string(&RuleCategory::DuplicateErrorRecording).unwrap();
        assert_eq!(json, "\"duplicate-error-recording\"");
        for c in RuleCategory::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json.trim_matches('"'), c.as_str());
        }
    }

    #[test]
    fn test_origin_follows_category() {
        let f = Finding::new("a.go", "go", loc(), RuleCategory::UnterminatedSpan, "m");
        assert_eq!(f.origin, FindingOrigin::Structural);
        assert_eq!(f.severity, Severity::High);
        let f = Finding::new("a.go", "go", loc(), RuleCategory::JudgmentUnavailable, "m");
        assert!(f.is_placeholder());
        let f = Finding::new("a.go", "go", loc(), RuleCategory::LoopBody, "m");
        assert_eq!(f.origin, FindingOrigin::Judged);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let f = Finding::new("a.go", "go", loc(), RuleCategory::LoopBody, "m");
        assert_eq!(f.clone().with_confidence(1.7).confidence, 1.0);
        assert_eq!(f.clone().with_confidence(-0.2).confidence, 0.0);
        assert_eq!(f.with_confidence(f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_builders_dedup() {
        let f = Finding::new("a.go", "go", loc(), RuleCategory::LoopBody, "m")
            .with_fix("hoist the span")
            .with_fix("hoist the span")
            .with_fix("  ")
            .with_rule_ref("abc")
            .with_rule_ref("abc")
            .with_subjects(vec!["x".to_string(), "x".to_string()]);
        assert_eq!(f.fixes.len(), 1);
        assert_eq!(f.rule_refs.len(), 1);
        assert_eq!(f.subjects, vec!["x".to_string()]);
    }
}
