// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Offline judge.
//!
//! Applies fixed checks that mirror the built-in rule corpus. It never
//! fails, so it also serves runs without network access.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::{BoundaryKind, ContextHint};
use crate::error::OracleError;
use crate::extract::SpanKindHint;
use crate::lang::ConstructKind;
use crate::rag::RulePassage;
use crate::report::{RuleCategory, Severity};

use super::{Judgment, JudgmentContext, JudgmentOracle};

static CAMEL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*[A-Z][A-Za-z0-9]*$").unwrap());
static PASCAL_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z0-9]+[A-Z][A-Za-z0-9]*$").unwrap());
static SNAKE_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(_[a-z0-9]+)+$").unwrap());
static TITLE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z0-9]*( [A-Z][a-z0-9]*)+$").unwrap());
static LOWER_HTTP_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(get|post|put|patch|delete|head|options)( |$)").unwrap());
static ATTRIBUTE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*$").unwrap());
static EVENT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_. ]*$").unwrap());
static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Judge that needs no network.
#[derive(Debug, Default, Clone)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    pub fn new() -> Self {
        Self
    }

    /// Decide without passages; the caller attaches the grounding passage.
    pub fn decide(&self, ctx: &JudgmentContext) -> Judgment {
        match ctx.category {
            RuleCategory::NamingConvention => judge_span_name(ctx),
            RuleCategory::AttributeNaming => judge_attribute_key(ctx),
            RuleCategory::EventNaming => judge_event_name(ctx),
            RuleCategory::MetricNaming => judge_metric_name(ctx),
            RuleCategory::BoundaryViolation => judge_boundary(ctx),
            RuleCategory::HighCardinality => judge_cardinality(ctx),
            RuleCategory::LoopBody if ctx.loop_body => Judgment::violation(
                "Span is created inside a loop, producing one span per iteration",
                "Create one span around the loop and record per-item details as events or attributes",
                Severity::Medium,
                0.7,
            ),
            RuleCategory::DuplicateErrorRecording if ctx.records_error && ctx.propagates_error => {
                let confidence = if ctx.related.is_empty() { 0.55 } else { 0.8 };
                Judgment::violation(
                    "Error is recorded on this span and also returned to a caller that records it again",
                    "Record the error where it is handled, or only annotate it here without recording",
                    Severity::Medium,
                    confidence,
                )
            }
            RuleCategory::NamingInconsistency if ctx.subjects.len() >= 2 => {
                let preferred = ctx
                    .subjects
                    .iter()
                    .find(|k| ATTRIBUTE_KEY.is_match(k))
                    .cloned()
                    .unwrap_or_else(|| snake_key(&ctx.subjects[0]));
                Judgment::violation(
                    format!(
                        "Attribute keys {} name the same value with different spellings",
                        quoted(&ctx.subjects)
                    ),
                    format!("Use one key, \"{}\", everywhere", preferred),
                    Severity::Medium,
                    0.8,
                )
            }
            RuleCategory::SensitiveAttribute => match ctx.primary_subject() {
                Some(key) => Judgment::violation(
                    format!("Attribute \"{}\" may carry personal data or secrets", key),
                    "Remove the attribute or record a redacted or hashed value",
                    Severity::High,
                    0.7,
                ),
                None => Judgment::clean(0.5),
            },
            RuleCategory::SpanKindMisuse => match ctx.span_kind {
                Some(kind) if kind.is_inbound() && ctx.boundary != BoundaryKind::Boundary => {
                    Judgment::violation(
                        format!(
                            "Span kind {} is used on a span that does not handle inbound work",
                            kind.as_str()
                        ),
                        "Use the internal kind, or client for outbound calls",
                        Severity::Medium,
                        0.6,
                    )
                }
                _ => Judgment::clean(0.6),
            },
            category if category.is_structural() => structural_judgment(ctx),
            _ => Judgment::clean(0.5),
        }
    }
}

#[async_trait]
impl JudgmentOracle for HeuristicJudge {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn judge(
        &self,
        context: &JudgmentContext,
        passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        let judgment = self.decide(context);
        let passage = if judgment.violated {
            passages.first().map(|p| p.id.clone())
        } else {
            None
        };
        Ok(judgment.with_passage(passage))
    }
}

/// Fixed verdicts for issues found from structure alone.
pub(crate) fn structural_judgment(ctx: &JudgmentContext) -> Judgment {
    let subject = ctx
        .primary_subject()
        .map(|s| format!(" \"{}\"", s))
        .unwrap_or_default();
    match ctx.category {
        RuleCategory::UnterminatedSpan if ctx.early_exit => Judgment::violation(
            format!("Span{} is not ended when the function exits early", subject),
            "End the span before each return, or use a deferred or finally end",
            Severity::Medium,
            0.7,
        ),
        RuleCategory::UnterminatedSpan => Judgment::violation(
            format!("Span{} is never ended", subject),
            "End the span on every path, for example with a deferred or finally end",
            Severity::High,
            0.9,
        ),
        RuleCategory::OrphanTelemetryCall => Judgment::violation(
            format!(
                "{}{} runs outside any open span",
                kind_label(ctx.construct_kind),
                subject
            ),
            "Move the call inside the span it belongs to",
            Severity::Low,
            0.4,
        ),
        RuleCategory::UnmatchedSpanEnd => Judgment::violation(
            "Span end has no matching span start",
            "Remove the end call or start the span in the same function",
            Severity::Low,
            0.5,
        ),
        _ => Judgment::clean(0.0),
    }
}

fn kind_label(kind: ConstructKind) -> &'static str {
    match kind {
        ConstructKind::AttributeSet => "Attribute",
        ConstructKind::EventAdd => "Event",
        ConstructKind::ErrorRecord => "Error record",
        ConstructKind::StatusSet => "Status update",
        _ => "Telemetry call",
    }
}

fn judge_span_name(ctx: &JudgmentContext) -> Judgment {
    let Some(name) = ctx.span_literal.as_deref().or(ctx.primary_subject()) else {
        return Judgment::clean(0.5);
    };

    if LOWER_HTTP_METHOD.is_match(name) {
        let (method, rest) = name.split_once(' ').unwrap_or((name, ""));
        let fixed = format!("{} {}", method.to_uppercase(), rest);
        return Judgment::violation(
            format!("HTTP method in span name \"{}\" is lower case", name),
            format!("Rename the span to \"{}\"", fixed.trim_end()),
            Severity::Low,
            0.75,
        );
    }

    let style = if CAMEL_CASE.is_match(name) {
        Some("camelCase")
    } else if PASCAL_CASE.is_match(name) {
        Some("PascalCase")
    } else if SNAKE_CASE.is_match(name) {
        Some("snake_case")
    } else if TITLE_CASE.is_match(name) {
        Some("Title Case")
    } else {
        None
    };

    match style {
        Some(style) => Judgment::violation(
            format!(
                "Span name \"{}\" is {}; span names use the {{verb}} {{object}} form",
                name, style
            ),
            format!("Rename the span to \"{}\"", words(name)),
            Severity::Medium,
            0.8,
        ),
        None => Judgment::clean(0.7),
    }
}

fn judge_attribute_key(ctx: &JudgmentContext) -> Judgment {
    let Some(key) = ctx.primary_subject() else {
        return Judgment::clean(0.5);
    };
    if ATTRIBUTE_KEY.is_match(key) {
        return Judgment::clean(0.8);
    }
    Judgment::violation(
        format!("Attribute key \"{}\" is not lowercase dotted snake_case", key),
        format!("Rename the key to \"{}\"", snake_key(key)),
        Severity::Low,
        0.75,
    )
}

fn judge_event_name(ctx: &JudgmentContext) -> Judgment {
    let Some(name) = ctx.primary_subject() else {
        return Judgment::clean(0.5);
    };
    if EVENT_NAME.is_match(name) {
        return Judgment::clean(0.7);
    }
    Judgment::violation(
        format!("Event name \"{}\" is not lower case", name),
        format!("Rename the event to \"{}\"", snake_key(name)),
        Severity::Low,
        0.6,
    )
}

fn judge_metric_name(ctx: &JudgmentContext) -> Judgment {
    let Some(name) = ctx.primary_subject() else {
        return Judgment::clean(0.5);
    };

    if !ATTRIBUTE_KEY.is_match(name) {
        return Judgment::violation(
            format!("Metric name \"{}\" is not lowercase and dot separated", name),
            format!("Rename the metric to \"{}\"", snake_key(name)),
            Severity::Low,
            0.7,
        );
    }

    let mut segments = name.split('.');
    let first = segments.next().unwrap_or(name);
    let rest: Vec<&str> = segments.collect();
    let service_prefixed = !rest.is_empty()
        && (first.ends_with("service") || first.ends_with("svc"));
    if service_prefixed {
        return Judgment::violation(
            format!("Metric name \"{}\" carries a service name prefix", name),
            format!(
                "Rename the metric to \"{}\" and identify the service through resource attributes",
                rest.join(".")
            ),
            Severity::Low,
            0.7,
        );
    }
    Judgment::clean(0.7)
}

fn judge_boundary(ctx: &JudgmentContext) -> Judgment {
    let outbound = matches!(
        ctx.span_kind,
        Some(SpanKindHint::Client) | Some(SpanKindHint::Producer)
    );
    if ctx.boundary == BoundaryKind::Internal && !outbound && ctx.hint == ContextHint::General {
        let function = ctx.function.as_deref().unwrap_or("this function");
        return Judgment::violation(
            format!(
                "Span is created in internal helper {} rather than at a service boundary",
                function
            ),
            "Create spans at request, RPC or message handlers, and add attributes or events to the active span here",
            Severity::Medium,
            0.6,
        );
    }
    Judgment::clean(0.5)
}

fn judge_cardinality(ctx: &JudgmentContext) -> Judgment {
    if !ctx.dynamic_name {
        return Judgment::clean(0.6);
    }
    let subject = ctx
        .primary_subject()
        .or(ctx.span_name.as_deref())
        .unwrap_or("");
    let (what, fix) = match ctx.construct_kind {
        ConstructKind::AttributeSet => (
            "Attribute key",
            "Use a fixed key and put the varying value in the attribute value",
        ),
        ConstructKind::MetricInstrument => (
            "Metric name",
            "Use a fixed metric name and move the varying part into an attribute",
        ),
        _ => (
            "Span name",
            "Use a fixed, low-cardinality span name and move identifiers into attributes",
        ),
    };
    if ctx.formatted_name {
        Judgment::violation(
            format!("{} {} is built from runtime values", what, subject),
            fix,
            Severity::High,
            0.8,
        )
    } else {
        Judgment::violation(
            format!("{} comes from variable {}, which may vary per request", what, subject),
            fix,
            Severity::Medium,
            0.45,
        )
    }
}

/// Lowercase words: `processUserData` becomes `process user data`.
fn words(name: &str) -> String {
    let spaced = WORD_BOUNDARY.replace_all(name, "$1 $2");
    spaced
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dotted snake case: `http.StatusCode` becomes `http.status_code`.
fn snake_key(key: &str) -> String {
    key.split('.')
        .map(|segment| words(segment).replace(' ', "_"))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("\"{}\"", s))
        .collect::<Vec<_>>()
        .join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(category: RuleCategory, subject: &str) -> JudgmentContext {
        let mut ctx = JudgmentContext::new(category, "go", "svc/main.go", 3, ConstructKind::SpanStart);
        ctx.subjects = vec![subject.to_string()];
        ctx
    }

    fn span_ctx(name: &str) -> JudgmentContext {
        let mut ctx = ctx(RuleCategory::NamingConvention, name);
        ctx.span_literal = Some(name.to_string());
        ctx
    }

    #[test]
    fn test_span_name_styles() {
        let judge = HeuristicJudge::new();
        for bad in ["processUserData", "ProcessUserData", "process_user_data", "Process User Data"] {
            let j = judge.decide(&span_ctx(bad));
            assert!(j.violated, "{}", bad);
            assert_eq!(j.fix, "Rename the span to \"process user data\"");
        }
        for good in ["process user data", "GET /users/{id}", "SELECT orders", "checkout"] {
            assert!(!judge.decide(&span_ctx(good)).violated, "{}", good);
        }

        let j = judge.decide(&span_ctx("get /users"));
        assert!(j.violated);
        assert_eq!(j.fix, "Rename the span to \"GET /users\"");
    }

    #[test]
    fn test_attribute_and_event_names() {
        let judge = HeuristicJudge::new();
        assert!(!judge.decide(&ctx(RuleCategory::AttributeNaming, "user.id")).violated);
        assert!(!judge.decide(&ctx(RuleCategory::AttributeNaming, "http.response.status_code")).violated);

        let j = judge.decide(&ctx(RuleCategory::AttributeNaming, "http.StatusCode"));
        assert!(j.violated);
        assert_eq!(j.fix, "Rename the key to \"http.status_code\"");

        assert!(judge.decide(&ctx(RuleCategory::EventNaming, "CacheMiss")).violated);
        assert!(!judge.decide(&ctx(RuleCategory::EventNaming, "cache.miss")).violated);
    }

    #[test]
    fn test_metric_names() {
        let judge = HeuristicJudge::new();
        for bad in ["myservice.http.duration", "checkoutservice.orders.count", "RequestCount"] {
            assert!(judge.decide(&ctx(RuleCategory::MetricNaming, bad)).violated, "{}", bad);
        }
        for good in ["http.server.request.duration", "db.client.operation.duration", "app.orders.placed"] {
            assert!(!judge.decide(&ctx(RuleCategory::MetricNaming, good)).violated, "{}", good);
        }
        let j = judge.decide(&ctx(RuleCategory::MetricNaming, "myservice.http.duration"));
        assert!(j.fix.contains("\"http.duration\""));
    }

    #[test]
    fn test_boundary_and_kind() {
        let judge = HeuristicJudge::new();
        let mut c = span_ctx("process user data");
        c.category = RuleCategory::BoundaryViolation;
        c.boundary = BoundaryKind::Internal;
        assert!(judge.decide(&c).violated);

        c.span_kind = Some(SpanKindHint::Client);
        assert!(!judge.decide(&c).violated);

        c.category = RuleCategory::SpanKindMisuse;
        c.span_kind = Some(SpanKindHint::Server);
        assert!(judge.decide(&c).violated);
        c.boundary = BoundaryKind::Boundary;
        assert!(!judge.decide(&c).violated);
    }

    #[test]
    fn test_inconsistent_keys() {
        let mut c = ctx(RuleCategory::NamingInconsistency, "userId");
        c.subjects = vec!["userId".to_string(), "user_id".to_string()];
        let j = HeuristicJudge::new().decide(&c);
        assert!(j.violated);
        assert!(j.message.contains("\"userId\" and \"user_id\""));
        assert_eq!(j.fix, "Use one key, \"user_id\", everywhere");
    }

    #[tokio::test]
    async fn test_judge_attaches_top_passage_only_on_violation() {
        let passages = vec![RulePassage {
            id: "p1".to_string(),
            text: "Span names use verb object".to_string(),
            score: 2.0,
            source: "builtin".to_string(),
            section: None,
        }];
        let judge = HeuristicJudge::new();
        let j = judge.judge(&span_ctx("processUserData"), &passages).await.unwrap();
        assert_eq!(j.passage_id.as_deref(), Some("p1"));

        let j = judge.judge(&span_ctx("process user data"), &passages).await.unwrap();
        assert!(j.passage_id.is_none());
    }

    #[test]
    fn test_structural_messages_name_the_subject() {
        let mut c = ctx(RuleCategory::OrphanTelemetryCall, "user.id");
        c.construct_kind = ConstructKind::AttributeSet;
        let j = structural_judgment(&c);
        assert_eq!(j.message, "Attribute \"user.id\" runs outside any open span");
        assert_eq!(j.confidence, 0.4);

        let mut c = span_ctx("load config");
        c.category = RuleCategory::UnterminatedSpan;
        let j = structural_judgment(&c);
        assert_eq!(j.message, "Span \"load config\" is never ended");
        assert_eq!(j.severity, Severity::High);

        c.early_exit = true;
        let j = structural_judgment(&c);
        assert_eq!(
            j.message,
            "Span \"load config\" is not ended when the function exits early"
        );
        assert_eq!(j.severity, Severity::Medium);
        assert!(j.confidence < 0.9);
    }
}
