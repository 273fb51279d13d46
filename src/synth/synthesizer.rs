// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Turns candidates into findings by consulting both oracles.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::context::{FileContext, ScopeId};
use crate::error::OracleError;
use crate::extract::{Extraction, SourceUnit};
use crate::judge::{structural_judgment, Judgment, JudgmentOracle};
use crate::rag::{RetrievalOracle, RulePassage};
use crate::report::{Finding, RuleCategory, Severity};

use super::candidates::{collect_candidates, scope_candidates, Candidate};
use super::policy::{CancellationFlag, OraclePolicy, SynthesisStats};

/// Raw findings for a file plus what it took to get them.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    /// In candidate order, not yet deduplicated.
    pub findings: Vec<Finding>,
    pub stats: SynthesisStats,
}

/// Consults the retrieval and judgment oracles for each candidate.
#[derive(Clone)]
pub struct Synthesizer {
    retrieval: Arc<dyn RetrievalOracle>,
    judge: Arc<dyn JudgmentOracle>,
    policy: OraclePolicy,
    top_k: usize,
    cancel: CancellationFlag,
}

impl Synthesizer {
    pub fn new(retrieval: Arc<dyn RetrievalOracle>, judge: Arc<dyn JudgmentOracle>) -> Self {
        Self {
            retrieval,
            judge,
            policy: OraclePolicy::default(),
            top_k: 3,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_policy(mut self, policy: OraclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn policy(&self) -> &OraclePolicy {
        &self.policy
    }

    /// Findings for every scope, orphan and instrument in a file.
    pub async fn synthesize_file(
        &self,
        unit: &SourceUnit,
        extraction: &Extraction,
        ctx: &FileContext,
        focus: Option<&str>,
    ) -> Synthesis {
        let start = Instant::now();
        let candidates = collect_candidates(unit, extraction, ctx, focus);
        let synthesis = self.run(candidates).await;

        info!(
            path = %unit.display_path(),
            findings = synthesis.findings.len(),
            calls = synthesis.stats.calls,
            failures = synthesis.stats.failures,
            "Synthesized file"
        );

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("synth.file", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        synthesis
    }

    /// Findings for one span scope and its attached constructs.
    pub async fn synthesize_scope(
        &self,
        unit: &SourceUnit,
        extraction: &Extraction,
        ctx: &FileContext,
        scope: ScopeId,
        focus: Option<&str>,
    ) -> Synthesis {
        self.run(scope_candidates(unit, extraction, ctx, scope, focus)).await
    }

    /// Evaluate candidates concurrently; output follows candidate order.
    pub async fn run(&self, candidates: Vec<Candidate>) -> Synthesis {
        let semaphore = Arc::new(Semaphore::new(self.policy.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let total = candidates.len();

        for (index, candidate) in candidates.into_iter().enumerate() {
            let worker = Worker {
                retrieval: Arc::clone(&self.retrieval),
                judge: Arc::clone(&self.judge),
                policy: self.policy.clone(),
                top_k: self.top_k,
                cancel: self.cancel.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => worker.evaluate(candidate).await,
                    Err(_) => Outcome::cancelled(),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<(usize, Outcome)> = Vec::with_capacity(total);
        let mut stats = SynthesisStats {
            candidates: total,
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Candidate task failed");
                    stats.failures += 1;
                    stats.calls += 1;
                }
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut findings = Vec::new();
        for (_, outcome) in outcomes {
            stats.merge(&outcome.stats);
            findings.extend(outcome.finding);
        }

        if stats.cancelled > 0 {
            #[cfg(feature = "telemetry")]
            GLOBAL_METRICS.add_to_counter("synth.cancelled", stats.cancelled as u64);
            info!(skipped = stats.cancelled, "Cancelled before all candidates were evaluated");
        }

        Synthesis { findings, stats }
    }
}

#[derive(Debug, Default)]
struct Outcome {
    finding: Option<Finding>,
    stats: SynthesisStats,
}

impl Outcome {
    fn cancelled() -> Self {
        Self {
            finding: None,
            stats: SynthesisStats {
                cancelled: 1,
                ..Default::default()
            },
        }
    }
}

struct Worker {
    retrieval: Arc<dyn RetrievalOracle>,
    judge: Arc<dyn JudgmentOracle>,
    policy: OraclePolicy,
    top_k: usize,
    cancel: CancellationFlag,
}

impl Worker {
    async fn evaluate(&self, candidate: Candidate) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::cancelled();
        }
        let mut stats = SynthesisStats::default();

        let query = candidate.context.query.as_str();
        let (retrieved, record) = self
            .policy
            .call("retrieval", &self.cancel, || self.retrieval.query(query, self.top_k))
            .await;
        let passages = match retrieved {
            Ok(passages) => {
                stats.record_call(&record, false);
                passages
            }
            Err(OracleError::Cancelled) => return Outcome::cancelled(),
            Err(e) => {
                stats.record_call(&record, true);
                warn!(
                    category = %candidate.category,
                    line = candidate.location.line,
                    error = %e,
                    "Retrieval failed, judging without rules"
                );
                Vec::new()
            }
        };

        if candidate.is_structural() {
            let judgment = structural_judgment(&candidate.context);
            return Outcome {
                finding: Some(finding(&candidate, judgment, &passages)),
                stats,
            };
        }

        let start = Instant::now();
        let (judged, record) = self
            .policy
            .call("judge", &self.cancel, || {
                self.judge.judge(&candidate.context, &passages)
            })
            .await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("judge.call", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        let judged = judged.and_then(Judgment::validate);
        let finding = match judged {
            Ok(judgment) => {
                stats.record_judge_call(&record, false);
                debug!(
                    category = %candidate.category,
                    line = candidate.location.line,
                    violated = judgment.violated,
                    confidence = judgment.confidence,
                    "Judged candidate"
                );
                judgment
                    .violated
                    .then(|| finding(&candidate, judgment, &passages))
            }
            Err(OracleError::Cancelled) => {
                stats.cancelled += 1;
                None
            }
            Err(e) => {
                stats.record_judge_call(&record, true);
                Some(placeholder(&candidate, &e))
            }
        };

        Outcome { finding, stats }
    }
}

/// Finding for a violated judgment, grounded in a retrieved passage.
fn finding(candidate: &Candidate, judgment: Judgment, passages: &[RulePassage]) -> Finding {
    let ctx = &candidate.context;
    let grounding = judgment
        .passage_id
        .as_ref()
        .filter(|id| passages.iter().any(|p| &p.id == *id))
        .cloned()
        .or_else(|| passages.first().map(|p| p.id.clone()));

    let mut finding = Finding::new(
        ctx.path.clone(),
        ctx.language.clone(),
        candidate.location,
        candidate.category,
        judgment.message,
    )
    .with_severity(judgment.severity)
    .with_confidence(judgment.confidence)
    .with_fix(judgment.fix)
    .with_subjects(ctx.subjects.iter().cloned())
    .with_related(candidate.related.iter().cloned())
    .with_function(ctx.function.clone())
    .with_snippet(ctx.snippet.clone());
    if let Some(id) = grounding {
        finding = finding.with_rule_ref(id);
    }
    finding
}

/// Stands in for a judgment that could not be obtained.
fn placeholder(candidate: &Candidate, error: &OracleError) -> Finding {
    let ctx = &candidate.context;
    Finding::new(
        ctx.path.clone(),
        ctx.language.clone(),
        candidate.location,
        RuleCategory::JudgmentUnavailable,
        format!("Could not evaluate {}: {}", candidate.category, error),
    )
    .with_severity(Severity::Low)
    .with_confidence(0.0)
    .with_subjects([candidate.category.as_str().to_string()])
    .with_function(ctx.function.clone())
    .with_snippet(ctx.snippet.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::build_context;
    use crate::extract::extract;
    use crate::judge::{HeuristicJudge, MockJudgmentOracle};
    use crate::lang::{Language, ProfileRegistry};
    use crate::rag::{KnowledgeCorpus, LexicalRetriever};
    use async_trait::async_trait;
    use std::time::Duration;

    const SOURCE: &str = r#"
func processUserData(ctx context.Context, id string) {
	ctx, span := tracer.Start(ctx, "processUserData")
	defer span.End()
}

func leak(ctx context.Context) {
	ctx, span := tracer.Start(ctx, "leak memory")
}
"#;

    struct EmptyRetrieval;

    #[async_trait]
    impl RetrievalOracle for EmptyRetrieval {
        fn name(&self) -> &str {
            "empty"
        }

        async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<RulePassage>, OracleError> {
            Ok(Vec::new())
        }
    }

    fn prepared() -> (SourceUnit, Extraction, FileContext) {
        let unit = SourceUnit::new("svc/user.go", Language::Go, SOURCE);
        let profile = ProfileRegistry::global().get(Language::Go).unwrap();
        let extraction = extract(&unit, profile);
        let ctx = build_context(&unit, &extraction, profile, &[]);
        (unit, extraction, ctx)
    }

    fn fast_policy() -> OraclePolicy {
        OraclePolicy::default()
            .with_timeout(Duration::from_millis(200))
            .with_retries(1, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_heuristic_run_grounds_findings() {
        let (unit, extraction, ctx) = prepared();
        let corpus = Arc::new(KnowledgeCorpus::builtin());
        let synth = Synthesizer::new(
            Arc::new(LexicalRetriever::new(corpus)),
            Arc::new(HeuristicJudge::new()),
        );
        let out = synth.synthesize_file(&unit, &extraction, &ctx, None).await;

        let naming = out
            .findings
            .iter()
            .find(|f| f.has_category(RuleCategory::NamingConvention))
            .unwrap();
        assert_eq!(naming.location.line, 3);
        assert!(!naming.rule_refs.is_empty());
        assert_eq!(naming.function.as_deref(), Some("processUserData"));

        let unterminated: Vec<_> = out
            .findings
            .iter()
            .filter(|f| f.has_category(RuleCategory::UnterminatedSpan))
            .collect();
        assert_eq!(unterminated.len(), 1);
        assert_eq!(unterminated[0].location.line, 8);
        assert_eq!(out.stats.failures, 0);
    }

    #[tokio::test]
    async fn test_structural_candidates_skip_the_judge() {
        let (unit, extraction, ctx) = prepared();
        let judged = collect_candidates(&unit, &extraction, &ctx, None)
            .iter()
            .filter(|c| !c.is_structural())
            .count();

        let mut judge = MockJudgmentOracle::new();
        judge
            .expect_judge()
            .times(judged)
            .returning(|_, _| Ok(Judgment::clean(0.9)));

        let synth = Synthesizer::new(Arc::new(EmptyRetrieval), Arc::new(judge));
        let out = synth.synthesize_file(&unit, &extraction, &ctx, None).await;
        assert_eq!(out.findings.len(), 1);
        assert!(out.findings[0].has_category(RuleCategory::UnterminatedSpan));
    }

    #[tokio::test]
    async fn test_failed_judgment_becomes_placeholder() {
        let (unit, extraction, ctx) = prepared();
        let mut judge = MockJudgmentOracle::new();
        judge
            .expect_judge()
            .returning(|_, _| Err(OracleError::Transport("connection refused".to_string())));

        let synth = Synthesizer::new(Arc::new(EmptyRetrieval), Arc::new(judge))
            .with_policy(fast_policy());
        let out = synth.synthesize_file(&unit, &extraction, &ctx, None).await;

        let placeholders: Vec<_> = out.findings.iter().filter(|f| f.is_placeholder()).collect();
        assert!(!placeholders.is_empty());
        assert!(placeholders.iter().all(|f| f.severity == Severity::Low));
        assert!(placeholders.iter().all(|f| f.confidence == 0.0));
        assert_eq!(out.stats.retries, placeholders.len());
        assert!(out
            .findings
            .iter()
            .any(|f| f.has_category(RuleCategory::UnterminatedSpan)));
    }

    #[tokio::test]
    async fn test_cancelled_run_calls_nothing() {
        let (unit, extraction, ctx) = prepared();
        let mut judge = MockJudgmentOracle::new();
        judge.expect_judge().times(0);

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let synth = Synthesizer::new(Arc::new(EmptyRetrieval), Arc::new(judge))
            .with_cancellation(cancel);
        let out = synth.synthesize_file(&unit, &extraction, &ctx, None).await;

        assert!(out.findings.is_empty());
        assert_eq!(out.stats.calls, 0);
        assert_eq!(out.stats.cancelled, out.stats.candidates);
    }

    #[tokio::test]
    async fn test_malformed_judgment_is_placeholder() {
        let (unit, extraction, ctx) = prepared();
        let mut judge = MockJudgmentOracle::new();
        judge.expect_judge().returning(|_, _| {
            Ok(Judgment::violation("", "", Severity::High, 0.9))
        });

        let synth = Synthesizer::new(Arc::new(EmptyRetrieval), Arc::new(judge));
        let out = synth.synthesize_file(&unit, &extraction, &ctx, None).await;
        assert!(out.findings.iter().any(|f| f.is_placeholder()));
        assert_eq!(out.stats.retries, 0);
    }
}
