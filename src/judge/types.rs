// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Judgment input and output.

use serde::{Deserialize, Serialize};

use crate::context::{BoundaryKind, ContextHint};
use crate::error::OracleError;
use crate::extract::SpanKindHint;
use crate::lang::{ConstructKind, EntryKind};
use crate::report::{RuleCategory, Severity};

/// Serialized context for one candidate issue.
///
/// This is exactly what the judge sees about the code, so everything it
/// needs to decide has to be in here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgmentContext {
    pub category: RuleCategory,
    /// Retrieval query formed for the candidate.
    pub query: String,
    pub language: String,
    pub path: String,
    pub line: usize,
    pub construct_kind: ConstructKind,
    /// Span name expression as written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_name: Option<String>,
    /// Literal value of a static span name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_literal: Option<String>,
    pub dynamic_name: bool,
    /// Name built by formatting or concatenation.
    pub formatted_name: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_kind: Option<SpanKindHint>,
    pub boundary: BoundaryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryKind>,
    pub loop_body: bool,
    /// Attribute keys set on the scope.
    pub attributes: Vec<String>,
    /// Event names added to the scope.
    pub events: Vec<String>,
    pub records_error: bool,
    pub propagates_error: bool,
    /// The span is ended, but an exit statement before the end skips it.
    pub early_exit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Other scopes involved, described in words.
    pub related: Vec<String>,
    /// The names or keys under judgment.
    pub subjects: Vec<String>,
    pub hint: ContextHint,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

impl JudgmentContext {
    /// Context with only the candidate identity filled in.
    pub fn new(
        category: RuleCategory,
        language: impl Into<String>,
        path: impl Into<String>,
        line: usize,
        construct_kind: ConstructKind,
    ) -> Self {
        Self {
            category,
            query: String::new(),
            language: language.into(),
            path: path.into(),
            line,
            construct_kind,
            span_name: None,
            span_literal: None,
            dynamic_name: false,
            formatted_name: false,
            span_kind: None,
            boundary: BoundaryKind::Unknown,
            entry: None,
            loop_body: false,
            attributes: Vec::new(),
            events: Vec::new(),
            records_error: false,
            propagates_error: false,
            early_exit: false,
            function: None,
            signature: None,
            related: Vec::new(),
            subjects: Vec::new(),
            hint: ContextHint::General,
            snippet: String::new(),
            focus: None,
        }
    }

    /// First subject, falling back to the span name.
    pub fn primary_subject(&self) -> Option<&str> {
        self.subjects
            .first()
            .map(String::as_str)
            .or(self.span_literal.as_deref())
            .or(self.span_name.as_deref())
    }
}

/// Structured answer from a judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub violated: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fix: String,
    pub severity: Severity,
    pub confidence: f32,
    /// Rule passage the judge based its answer on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_id: Option<String>,
}

impl Judgment {
    /// No violation.
    pub fn clean(confidence: f32) -> Self {
        Self {
            violated: false,
            message: String::new(),
            fix: String::new(),
            severity: Severity::Low,
            confidence,
            passage_id: None,
        }
    }

    pub fn violation(
        message: impl Into<String>,
        fix: impl Into<String>,
        severity: Severity,
        confidence: f32,
    ) -> Self {
        Self {
            violated: true,
            message: message.into(),
            fix: fix.into(),
            severity,
            confidence,
            passage_id: None,
        }
    }

    pub fn with_passage(mut self, passage_id: Option<String>) -> Self {
        self.passage_id = passage_id;
        self
    }

    /// Reject judgments the synthesizer cannot use.
    pub fn validate(self) -> Result<Self, OracleError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(OracleError::Malformed(format!(
                "confidence out of range: {}",
                self.confidence
            )));
        }
        if self.violated && self.message.trim().is_empty() {
            return Err(OracleError::Malformed(
                "violation without a message".to_string(),
            ));
        }
        Ok(self)
    }
}
