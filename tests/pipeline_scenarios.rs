// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end scenarios through the public analyzer API with scripted oracles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tracelint::config::ResolvedConfig;
use tracelint::judge::{Judgment, JudgmentContext, JudgmentOracle};
use tracelint::rag::{RetrievalOracle, RulePassage};
use tracelint::report::{reduce, Finding, Location, RuleCategory, Severity};
use tracelint::{AnalysisError, Analyzer, CancellationFlag, Language, OracleError};

// ============================================================================
// Scripted oracles
// ============================================================================

/// Returns one fixed passage for every query.
struct StubRetrieval;

#[async_trait]
impl RetrievalOracle for StubRetrieval {
    fn name(&self) -> &str {
        "stub"
    }

    async fn query(&self, _text: &str, top_k: usize) -> Result<Vec<RulePassage>, OracleError> {
        let passage = RulePassage {
            id: "rule-1".to_string(),
            text: "Span names should be low-cardinality and human readable.".to_string(),
            score: 1.0,
            source: "rules.md".to_string(),
            section: Some("Naming".to_string()),
        };
        Ok(std::iter::repeat(passage).take(top_k.min(1)).collect())
    }
}

struct DownRetrieval;

#[async_trait]
impl RetrievalOracle for DownRetrieval {
    fn name(&self) -> &str {
        "down"
    }

    async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<RulePassage>, OracleError> {
        Err(OracleError::Unavailable("index offline".to_string()))
    }
}

/// Reports a violation for each scripted category, nothing otherwise.
#[derive(Default)]
struct ScriptedJudge {
    verdicts: HashMap<RuleCategory, (Severity, f32)>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    fn violating(verdicts: &[(RuleCategory, Severity, f32)]) -> Self {
        Self {
            verdicts: verdicts.iter().map(|&(c, s, conf)| (c, (s, conf))).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JudgmentOracle for ScriptedJudge {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn judge(
        &self,
        context: &JudgmentContext,
        passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match self.verdicts.get(&context.category) {
            Some(&(severity, confidence)) => Judgment::violation(
                format!("{} violated", context.category),
                "follow the rule",
                severity,
                confidence,
            )
            .with_passage(passages.first().map(|p| p.id.clone())),
            None => Judgment::clean(0.9),
        })
    }
}

/// Fails with a transport error for the first `failures` calls.
struct FlakyJudge {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl JudgmentOracle for FlakyJudge {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn judge(
        &self,
        context: &JudgmentContext,
        _passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(OracleError::Transport("connection reset".to_string()));
        }
        Ok(Judgment::violation(
            format!("{} violated", context.category),
            "",
            Severity::Medium,
            0.7,
        ))
    }
}

/// Never answers within any sane timeout.
struct SlowJudge;

#[async_trait]
impl JudgmentOracle for SlowJudge {
    fn name(&self) -> &str {
        "slow"
    }

    async fn judge(
        &self,
        _context: &JudgmentContext,
        _passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Judgment::clean(0.5))
    }
}

/// Cancels the run from inside its first call, then reports a violation.
#[derive(Default)]
struct CancellingJudge {
    cancel: OnceCell<CancellationFlag>,
    calls: AtomicUsize,
}

#[async_trait]
impl JudgmentOracle for CancellingJudge {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn judge(
        &self,
        context: &JudgmentContext,
        _passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.get() {
            cancel.cancel();
        }
        Ok(Judgment::violation(
            format!("{} violated", context.category),
            "",
            Severity::Medium,
            0.8,
        ))
    }
}

fn fast_config() -> ResolvedConfig {
    ResolvedConfig {
        oracle_timeout_ms: 50,
        max_retries: 1,
        retry_backoff_ms: 1,
        ..ResolvedConfig::default()
    }
}

fn analyzer(judge: Arc<dyn JudgmentOracle>) -> Analyzer {
    Analyzer::new(fast_config(), Arc::new(StubRetrieval), judge)
}

fn line_of(text: &str, needle: &str) -> usize {
    text.lines()
        .position(|l| l.contains(needle))
        .map(|i| i + 1)
        .unwrap_or_else(|| panic!("{needle} not in sample"))
}

fn with_category(findings: &[Finding], category: RuleCategory) -> Vec<&Finding> {
    findings.iter().filter(|f| f.has_category(category)).collect()
}

// ============================================================================
// Samples
// ============================================================================

const CAMEL_CASE_INTERNAL: &str = r#"package users

func processUserData(ctx context.Context, data []byte) error {
	ctx, span := tracer.Start(ctx, "processUserData")
	defer span.End()
	return store(ctx, data)
}
"#;

const UNTERMINATED: &str = r#"package users

func loadUser(ctx context.Context, id string) error {
	ctx, span := tracer.Start(ctx, "load user")
	return db.Get(ctx, id)
}
"#;

const EARLY_RETURN: &str = r#"package work

func doWork(ctx context.Context) error {
	ctx, span := tracer.Start(ctx, "do work")
	if err := step(ctx); err != nil {
		return err
	}
	span.End()
	return nil
}
"#;

const MIXED_KEYS: &str = r#"package users

func loadUser(ctx context.Context, id string) error {
	ctx, span := tracer.Start(ctx, "load user")
	defer span.End()
	span.SetAttributes(attribute.String("user_id", id), attribute.String("userId", id))
	return db.Get(ctx, id)
}
"#;

const DUPLICATE_ERROR: &str = r#"package users

func loadUser(ctx context.Context, id string) (*User, error) {
	ctx, span := tracer.Start(ctx, "load user")
	defer span.End()
	u, err := repo.Find(ctx, id)
	if err != nil {
		span.RecordError(err)
		return nil, err
	}
	return u, nil
}

func HandleGetUser(w http.ResponseWriter, r *http.Request) {
	ctx, span := tracer.Start(r.Context(), "GET /users/{id}")
	defer span.End()
	user, err := loadUser(ctx, r.URL.Query().Get("id"))
	if err != nil {
		span.RecordError(err)
		http.Error(w, err.Error(), 500)
		return
	}
	_ = user
}
"#;

const LOOP: &str = r#"package batch

func HandleBatch(w http.ResponseWriter, r *http.Request) {
	items := []string{"a", "b", "c"}
	for _, item := range items {
		ctx, span := tracer.Start(r.Context(), "process item")
		handle(ctx, item)
		span.End()
	}
}
"#;

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_camel_case_internal_span() {
    let judge = Arc::new(ScriptedJudge::violating(&[
        (RuleCategory::NamingConvention, Severity::Medium, 0.8),
        (RuleCategory::BoundaryViolation, Severity::Medium, 0.6),
    ]));
    let report = analyzer(judge)
        .analyze_source("users.go", Language::Go, CAMEL_CASE_INTERNAL)
        .await
        .unwrap();

    let line = line_of(CAMEL_CASE_INTERNAL, "tracer.Start");
    let at_span: Vec<&Finding> = report
        .findings
        .iter()
        .filter(|f| f.location.line == line)
        .collect();
    assert!(at_span.iter().any(|f| f.has_category(RuleCategory::NamingConvention)));
    assert!(at_span.iter().any(|f| f.has_category(RuleCategory::BoundaryViolation)));
    assert!(at_span.iter().all(|f| f.severity >= Severity::Medium));

    let naming = with_category(&report.findings, RuleCategory::NamingConvention);
    assert_eq!(naming[0].subjects, vec!["processUserData".to_string()]);
    assert_eq!(naming[0].rule_refs, vec!["rule-1".to_string()]);
    assert_eq!(naming[0].function.as_deref(), Some("processUserData"));
}

#[tokio::test]
async fn test_unterminated_span_reported_once() {
    let report = analyzer(Arc::new(ScriptedJudge::default()))
        .analyze_source("users.go", Language::Go, UNTERMINATED)
        .await
        .unwrap();

    let unterminated = with_category(&report.findings, RuleCategory::UnterminatedSpan);
    assert_eq!(unterminated.len(), 1);
    assert_eq!(unterminated[0].location.line, line_of(UNTERMINATED, "tracer.Start"));
    assert!(unterminated[0].confidence > 0.0);
}

#[tokio::test]
async fn test_early_return_skips_explicit_end() {
    let report = analyzer(Arc::new(ScriptedJudge::default()))
        .analyze_source("work.go", Language::Go, EARLY_RETURN)
        .await
        .unwrap();

    let unterminated = with_category(&report.findings, RuleCategory::UnterminatedSpan);
    assert_eq!(unterminated.len(), 1);
    let finding = unterminated[0];
    assert_eq!(finding.location.line, line_of(EARLY_RETURN, "tracer.Start"));
    assert_eq!(finding.severity, Severity::Medium);
    assert!(finding.message.contains("exits early"));
    assert_eq!(finding.related.len(), 1);
    assert_eq!(finding.related[0].location.line, line_of(EARLY_RETURN, "return err"));
}

#[tokio::test]
async fn test_inconsistent_attribute_keys() {
    let judge = Arc::new(ScriptedJudge::violating(&[(
        RuleCategory::NamingInconsistency,
        Severity::Low,
        0.7,
    )]));
    let report = analyzer(judge)
        .analyze_source("users.go", Language::Go, MIXED_KEYS)
        .await
        .unwrap();

    let inconsistent = with_category(&report.findings, RuleCategory::NamingInconsistency);
    assert_eq!(inconsistent.len(), 1);
    assert!(inconsistent[0].subjects.contains(&"user_id".to_string()));
    assert!(inconsistent[0].subjects.contains(&"userId".to_string()));
}

#[tokio::test]
async fn test_duplicate_error_recording_points_at_caller() {
    let judge = Arc::new(ScriptedJudge::violating(&[(
        RuleCategory::DuplicateErrorRecording,
        Severity::Medium,
        0.75,
    )]));
    let report = analyzer(judge)
        .analyze_source("users.go", Language::Go, DUPLICATE_ERROR)
        .await
        .unwrap();

    let duplicates = with_category(&report.findings, RuleCategory::DuplicateErrorRecording);
    assert_eq!(duplicates.len(), 1);
    let finding = duplicates[0];
    assert_eq!(finding.location.line, line_of(DUPLICATE_ERROR, "\"load user\""));
    assert_eq!(finding.related.len(), 1);
    assert_eq!(
        finding.related[0].location.line,
        line_of(DUPLICATE_ERROR, "\"GET /users/{id}\"")
    );
    assert!(finding.related[0].note.contains("HandleGetUser"));
}

#[tokio::test]
async fn test_span_in_loop_reported_once() {
    let judge = Arc::new(ScriptedJudge::violating(&[(
        RuleCategory::LoopBody,
        Severity::Medium,
        0.8,
    )]));
    let report = analyzer(judge)
        .analyze_source("batch.go", Language::Go, LOOP)
        .await
        .unwrap();

    let loops = with_category(&report.findings, RuleCategory::LoopBody);
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].location.line, line_of(LOOP, "tracer.Start"));
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let judge = Arc::new(ScriptedJudge::violating(&[
        (RuleCategory::NamingConvention, Severity::Medium, 0.8),
        (RuleCategory::DuplicateErrorRecording, Severity::Medium, 0.75),
        (RuleCategory::AttributeNaming, Severity::Low, 0.4),
    ]));
    let analyzer = analyzer(judge);

    let first = analyzer
        .analyze_source("users.go", Language::Go, DUPLICATE_ERROR)
        .await
        .unwrap();
    let second = analyzer
        .analyze_source("users.go", Language::Go, DUPLICATE_ERROR)
        .await
        .unwrap();
    assert_eq!(first.findings, second.findings);
}

#[test]
fn test_dedup_is_order_independent() {
    let at = Location {
        line: 4,
        column: 2,
        offset: 60,
    };
    let a = Finding::new("a.go", "go", at, RuleCategory::NamingConvention, "camelCase span name")
        .with_confidence(0.7)
        .with_rule_ref("r1");
    let b = Finding::new("a.go", "go", at, RuleCategory::NamingConvention, "not a verb phrase")
        .with_confidence(0.5)
        .with_rule_ref("r2");
    let c = Finding::new("a.go", "go", at, RuleCategory::LoopBody, "span in loop").with_confidence(0.6);

    let forward = reduce(vec![a.clone(), b.clone(), c.clone()]);
    let backward = reduce(vec![c, b, a]);
    assert_eq!(forward, backward);
    assert_eq!(forward.len(), 2);

    let merged = forward
        .iter()
        .find(|f| f.has_category(RuleCategory::NamingConvention))
        .unwrap();
    assert!((merged.confidence - 0.85).abs() < 1e-6);
    assert_eq!(merged.rule_refs.len(), 2);
}

#[tokio::test]
async fn test_retry_recovers_transient_failure() {
    let judge = Arc::new(FlakyJudge {
        failures: 1,
        calls: AtomicUsize::new(0),
    });
    let config = ResolvedConfig {
        max_concurrency: 1,
        ..fast_config()
    };
    let analyzer = Analyzer::new(config, Arc::new(StubRetrieval), judge);
    let report = analyzer
        .analyze_source("users.go", Language::Go, CAMEL_CASE_INTERNAL)
        .await
        .unwrap();

    assert_eq!(report.stats.retries, 1);
    assert_eq!(report.stats.judge_failures, 0);
    assert!(report.findings.iter().all(|f| !f.is_placeholder()));
    assert!(!with_category(&report.findings, RuleCategory::NamingConvention).is_empty());
}

#[tokio::test]
async fn test_timeouts_become_placeholders() {
    let report = analyzer(Arc::new(SlowJudge))
        .analyze_source("users.go", Language::Go, CAMEL_CASE_INTERNAL)
        .await
        .unwrap();

    let placeholders: Vec<&Finding> = report.findings.iter().filter(|f| f.is_placeholder()).collect();
    assert!(!placeholders.is_empty());
    assert!(placeholders.iter().all(|f| f.has_category(RuleCategory::JudgmentUnavailable)));
    assert!(placeholders.iter().all(|f| f.message.contains("timed out")));
    assert!(report.stats.timeouts >= 2);
    assert!(report.stats.all_failed());
}

#[tokio::test]
async fn test_unavailable_judge_fails_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.go");
    std::fs::write(&path, CAMEL_CASE_INTERNAL).unwrap();

    let result = analyzer(Arc::new(SlowJudge)).analyze_file(&path).await;
    assert!(matches!(result, Err(AnalysisError::OracleUnavailable { .. })));
}

#[tokio::test]
async fn test_retrieval_failure_is_not_fatal() {
    let judge = Arc::new(ScriptedJudge::violating(&[(
        RuleCategory::NamingConvention,
        Severity::Medium,
        0.8,
    )]));
    let analyzer = Analyzer::new(fast_config(), Arc::new(DownRetrieval), judge.clone());
    let report = analyzer
        .analyze_source("users.go", Language::Go, CAMEL_CASE_INTERNAL)
        .await
        .unwrap();

    let naming = with_category(&report.findings, RuleCategory::NamingConvention);
    assert_eq!(naming.len(), 1);
    assert!(naming[0].rule_refs.is_empty());
    assert!(judge.calls.load(Ordering::SeqCst) > 0);
    assert!(report.stats.failures > 0);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let judge = Arc::new(ScriptedJudge::violating(&[(
        RuleCategory::NamingConvention,
        Severity::Medium,
        0.8,
    )]));
    let analyzer = analyzer(judge.clone());
    analyzer.cancellation().cancel();

    let report = analyzer
        .analyze_source("users.go", Language::Go, CAMEL_CASE_INTERNAL)
        .await
        .unwrap();
    assert!(report.findings.is_empty());
    assert!(report.stats.cancelled > 0);
    assert_eq!(report.stats.cancelled, report.stats.candidates);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_during_run_keeps_finished_work() {
    let judge = Arc::new(CancellingJudge::default());
    let config = ResolvedConfig {
        max_concurrency: 1,
        ..fast_config()
    };
    let analyzer = Analyzer::new(config, Arc::new(StubRetrieval), judge.clone());
    assert!(judge.cancel.set(analyzer.cancellation()).is_ok());

    let report = analyzer
        .analyze_source("users.go", Language::Go, MIXED_KEYS)
        .await
        .unwrap();

    assert!(report.stats.candidates > 2);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.judge_calls, 1);
    assert_eq!(report.stats.cancelled, report.stats.candidates - 1);
    assert_eq!(report.findings.len(), 1);
    assert!(!report.findings[0].is_placeholder());
}
