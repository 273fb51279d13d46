// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Candidate issues derived from a file's structure.
//!
//! A candidate is a category worth asking about at one construct or scope.
//! Whether it is a real violation is decided later; here only the
//! structure decides what is worth asking.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::{context_hint, BoundaryKind, FileContext, ScopeId, SpanScope};
use crate::extract::{Construct, ConstructId, Extraction, SourceUnit};
use crate::judge::JudgmentContext;
use crate::lang::ConstructKind;
use crate::report::{Location, Related, RuleCategory};

use super::query::formulate_query;

static SENSITIVE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(passw(or)?d|secret|token|api[_.]?key|ssn|social[_.]?security|credit[_.]?card|card[_.]?number|cvv|e[_.-]?mail|phone|authorization|cookie|date[_.]?of[_.]?birth)",
    )
    .unwrap()
});

/// Lines of source shown around a construct.
const SNIPPET_RADIUS: usize = 2;

/// One question for the oracles.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub category: RuleCategory,
    pub location: Location,
    /// Construct the finding will reference.
    pub construct: ConstructId,
    pub scope: Option<ScopeId>,
    pub related: Vec<Related>,
    pub context: JudgmentContext,
}

impl Candidate {
    /// Reported without asking the judge.
    pub fn is_structural(&self) -> bool {
        self.category.is_structural()
    }
}

/// Every candidate in a file, scopes first, then orphans and instruments.
pub fn collect_candidates(
    unit: &SourceUnit,
    extraction: &Extraction,
    ctx: &FileContext,
    focus: Option<&str>,
) -> Vec<Candidate> {
    let collector = Collector {
        unit,
        extraction,
        ctx,
        focus,
    };
    let mut out = Vec::new();
    for scope in &ctx.scopes {
        collector.scope(scope, &mut out);
    }
    for &id in &ctx.unmatched {
        collector.unmatched(id, &mut out);
    }
    for &id in &ctx.instruments {
        collector.instrument(id, &mut out);
    }
    out
}

/// Candidates for one span scope and the constructs attached to it.
pub fn scope_candidates(
    unit: &SourceUnit,
    extraction: &Extraction,
    ctx: &FileContext,
    scope: ScopeId,
    focus: Option<&str>,
) -> Vec<Candidate> {
    let collector = Collector {
        unit,
        extraction,
        ctx,
        focus,
    };
    let mut out = Vec::new();
    if let Some(scope) = ctx.scope(scope) {
        collector.scope(scope, &mut out);
    }
    out
}

/// Key with case and separators removed: `user_id`, `userId` and
/// `user.id` share the form `userid`.
pub fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY.is_match(key)
}

fn location(construct: &Construct) -> Location {
    Location {
        line: construct.line,
        column: construct.column,
        offset: construct.offset,
    }
}

struct Collector<'a> {
    unit: &'a SourceUnit,
    extraction: &'a Extraction,
    ctx: &'a FileContext,
    focus: Option<&'a str>,
}

impl Collector<'_> {
    fn construct(&self, id: ConstructId) -> Option<&Construct> {
        self.extraction.constructs.get(id)
    }

    /// Context for a candidate at `subject` inside `scope`.
    fn context(
        &self,
        category: RuleCategory,
        subject: &Construct,
        scope: Option<&SpanScope>,
        subjects: Vec<String>,
    ) -> JudgmentContext {
        let mut ctx = JudgmentContext::new(
            category,
            self.unit.language().as_str(),
            self.unit.display_path(),
            subject.line,
            subject.kind,
        );
        ctx.subjects = subjects;
        ctx.dynamic_name = subject.is_dynamic();
        ctx.formatted_name = subject.name.as_ref().is_some_and(|n| n.dynamic && n.is_formatted());
        ctx.snippet = self.unit.snippet(subject.line, SNIPPET_RADIUS);
        ctx.focus = self.focus.map(str::to_string);
        ctx.hint = context_hint(self.unit, subject.line);

        if let Some(scope) = scope {
            if let Some(start) = self.construct(scope.start) {
                ctx.span_name = start.name.as_ref().map(|n| n.raw.clone());
                ctx.span_literal = start
                    .name
                    .as_ref()
                    .and_then(|n| n.static_name())
                    .map(str::to_string);
                ctx.span_kind = start.span_kind;
            }
            ctx.boundary = scope.classification.boundary;
            ctx.entry = scope.classification.entry;
            ctx.loop_body = scope.classification.loop_body;
            ctx.hint = scope.hint;
            ctx.attributes = self.names(scope.id, ConstructKind::AttributeSet);
            ctx.events = self.names(scope.id, ConstructKind::EventAdd);
            ctx.records_error = self.ctx.records_error(self.extraction, scope.id);
            ctx.propagates_error = scope.propagates_error;
            ctx.early_exit = scope.early_exit.is_some();
            if let Some(facts) = scope.function.and_then(|b| self.ctx.function(b)) {
                ctx.function = facts.name.clone();
                ctx.signature = Some(facts.signature.clone());
            }
        }

        ctx.query = formulate_query(&ctx);
        ctx
    }

    fn names(&self, scope: ScopeId, kind: ConstructKind) -> Vec<String> {
        self.ctx
            .attached(self.extraction, scope, kind)
            .filter_map(|c| c.display_name())
            .map(str::to_string)
            .collect()
    }

    fn push(
        &self,
        out: &mut Vec<Candidate>,
        category: RuleCategory,
        subject: &Construct,
        scope: Option<&SpanScope>,
        subjects: Vec<String>,
        related: Vec<Related>,
    ) {
        let mut context = self.context(category, subject, scope, subjects);
        context.related = related.iter().map(|r| r.note.clone()).collect();
        out.push(Candidate {
            category,
            location: location(subject),
            construct: subject.index,
            scope: scope.map(|s| s.id),
            related,
            context,
        });
    }

    fn scope(&self, scope: &SpanScope, out: &mut Vec<Candidate>) {
        let Some(start) = self.construct(scope.start) else {
            return;
        };
        let name = start.display_name().map(str::to_string);
        let subjects = || name.iter().cloned().collect::<Vec<_>>();

        if scope.is_unterminated() {
            let related = self.early_exit(scope);
            self.push(out, RuleCategory::UnterminatedSpan, start, Some(scope), subjects(), related);
        }
        if let Some(literal) = start.name.as_ref().and_then(|n| n.static_name()) {
            self.push(
                out,
                RuleCategory::NamingConvention,
                start,
                Some(scope),
                vec![literal.to_string()],
                Vec::new(),
            );
        }
        if start.is_dynamic() {
            self.push(out, RuleCategory::HighCardinality, start, Some(scope), subjects(), Vec::new());
        }
        if scope.classification.boundary == BoundaryKind::Internal {
            self.push(out, RuleCategory::BoundaryViolation, start, Some(scope), subjects(), Vec::new());
            if start.span_kind.is_some_and(|k| k.is_inbound()) {
                self.push(out, RuleCategory::SpanKindMisuse, start, Some(scope), subjects(), Vec::new());
            }
        }
        if scope.classification.loop_body {
            self.push(out, RuleCategory::LoopBody, start, Some(scope), subjects(), Vec::new());
        }
        if scope.propagates_error && self.ctx.records_error(self.extraction, scope.id) {
            let related = self.error_callers(scope);
            self.push(
                out,
                RuleCategory::DuplicateErrorRecording,
                start,
                Some(scope),
                subjects(),
                related,
            );
        }

        self.inconsistent_keys(scope, start, out);

        for &id in &scope.constructs {
            let Some(c) = self.construct(id) else {
                continue;
            };
            match c.kind {
                ConstructKind::AttributeSet => self.attribute(c, scope, out),
                ConstructKind::EventAdd => {
                    if let Some(event) = c.name.as_ref().and_then(|n| n.static_name()) {
                        self.push(
                            out,
                            RuleCategory::EventNaming,
                            c,
                            Some(scope),
                            vec![event.to_string()],
                            Vec::new(),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn attribute(&self, c: &Construct, scope: &SpanScope, out: &mut Vec<Candidate>) {
        let Some(name) = c.name.as_ref() else {
            return;
        };
        let key = name.display().to_string();
        match name.static_name() {
            Some(literal) => {
                self.push(
                    out,
                    RuleCategory::AttributeNaming,
                    c,
                    Some(scope),
                    vec![literal.to_string()],
                    Vec::new(),
                );
                if is_sensitive_key(literal) {
                    self.push(
                        out,
                        RuleCategory::SensitiveAttribute,
                        c,
                        Some(scope),
                        vec![literal.to_string()],
                        Vec::new(),
                    );
                }
            }
            None => self.push(out, RuleCategory::HighCardinality, c, Some(scope), vec![key], Vec::new()),
        }
    }

    /// One candidate per group of static keys that differ only in spelling.
    fn inconsistent_keys(&self, scope: &SpanScope, start: &Construct, out: &mut Vec<Candidate>) {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for c in self.ctx.attached(self.extraction, scope.id, ConstructKind::AttributeSet) {
            if let Some(key) = c.name.as_ref().and_then(|n| n.static_name()) {
                let group = groups.entry(canonical_key(key)).or_default();
                if !group.iter().any(|k| k == key) {
                    group.push(key.to_string());
                }
            }
        }
        for (_, mut keys) in groups {
            if keys.len() < 2 {
                continue;
            }
            keys.sort();
            self.push(out, RuleCategory::NamingInconsistency, start, Some(scope), keys, Vec::new());
        }
    }

    fn early_exit(&self, scope: &SpanScope) -> Vec<Related> {
        let Some(offset) = scope.early_exit else {
            return Vec::new();
        };
        let (line, column) = self.unit.line_col(offset);
        vec![Related {
            location: Location {
                line,
                column,
                offset,
            },
            note: format!("exit at line {line} skips the span end"),
        }]
    }

    fn error_callers(&self, scope: &SpanScope) -> Vec<Related> {
        scope
            .error_callers
            .iter()
            .filter_map(|&id| self.ctx.scope(id))
            .filter_map(|caller| {
                let start = self.construct(caller.start)?;
                let function = caller
                    .function
                    .and_then(|b| self.ctx.function(b))
                    .and_then(|f| f.name.clone())
                    .unwrap_or_else(|| "caller".to_string());
                Some(Related {
                    location: location(start),
                    note: format!(
                        "span \"{}\" in {} records the same error",
                        start.display_name().unwrap_or("?"),
                        function
                    ),
                })
            })
            .collect()
    }

    fn unmatched(&self, id: ConstructId, out: &mut Vec<Candidate>) {
        let Some(c) = self.construct(id) else {
            return;
        };
        let subjects: Vec<String> = c.display_name().map(str::to_string).into_iter().collect();
        let category = if c.kind == ConstructKind::SpanEnd {
            RuleCategory::UnmatchedSpanEnd
        } else {
            RuleCategory::OrphanTelemetryCall
        };
        self.push(out, category, c, None, subjects, Vec::new());
    }

    fn instrument(&self, id: ConstructId, out: &mut Vec<Candidate>) {
        let Some(c) = self.construct(id) else {
            return;
        };
        let Some(name) = c.name.as_ref() else {
            return;
        };
        match name.static_name() {
            Some(literal) => {
                self.push(out, RuleCategory::MetricNaming, c, None, vec![literal.to_string()], Vec::new())
            }
            None if name.is_formatted() => self.push(
                out,
                RuleCategory::HighCardinality,
                c,
                None,
                vec![name.display().to_string()],
                Vec::new(),
            ),
            None => {}
        }
    }
}
