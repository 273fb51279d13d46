// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pipeline driver.
//!
//! Runs extraction, context building, synthesis and deduplication for a
//! single source text, a file, or every supported file under a directory.
//! Files are analyzed concurrently up to `maxParallelFiles`; each file's
//! oracle calls are bounded separately by `maxConcurrency`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::config::ResolvedConfig;
use crate::context::build_context;
use crate::error::AnalysisError;
use crate::extract::{extract, SourceUnit};
use crate::judge::JudgmentOracle;
use crate::lang::{Language, ProfileRegistry};
use crate::rag::RetrievalOracle;
use crate::report::{FileReport, RunReport, SkippedFile};
use crate::synth::{CancellationFlag, SynthesisStats, Synthesizer};

/// Called once per finished or skipped file during a scan.
pub type ProgressFn = Arc<dyn Fn(&Path) + Send + Sync>;

/// Analyzes sources against the rule corpus.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<ResolvedConfig>,
    synthesizer: Synthesizer,
}

impl Analyzer {
    pub fn new(
        config: ResolvedConfig,
        retrieval: Arc<dyn RetrievalOracle>,
        judge: Arc<dyn JudgmentOracle>,
    ) -> Self {
        let synthesizer = Synthesizer::new(retrieval, judge)
            .with_policy(config.oracle_policy())
            .with_top_k(config.top_k);
        Self {
            config: Arc::new(config),
            synthesizer,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Handle that stops new oracle calls when cancelled.
    pub fn cancellation(&self) -> CancellationFlag {
        self.synthesizer.cancellation()
    }

    /// Analyze one in-memory source text.
    pub async fn analyze_source(
        &self,
        path: impl Into<PathBuf>,
        language: Language,
        text: impl Into<String>,
    ) -> Result<FileReport, AnalysisError> {
        let start = Instant::now();
        let unit = SourceUnit::new(path, language, text);
        let profile = ProfileRegistry::global()
            .get(language)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage(unit.display_path()))?;

        let extraction = extract(&unit, profile);
        let ctx = build_context(&unit, &extraction, profile, &self.config.entry_functions);
        debug!(
            path = %unit.display_path(),
            constructs = extraction.constructs.len(),
            scopes = ctx.scopes.len(),
            "Built context"
        );

        let synthesis = self
            .synthesizer
            .synthesize_file(&unit, &extraction, &ctx, self.config.focus.as_deref())
            .await;

        let report = FileReport::new(
            unit.display_path(),
            language.as_str(),
            synthesis.findings,
            extraction.skipped.len(),
            synthesis.stats,
        );

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("analyze.file", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(report)
    }

    /// Analyze one file, detecting its language.
    pub async fn analyze_file(&self, path: &Path) -> Result<RunReport, AnalysisError> {
        self.analyze_file_as(path, None).await
    }

    /// Analyze one file; `language` overrides detection.
    pub async fn analyze_file_as(
        &self,
        path: &Path,
        language: Option<Language>,
    ) -> Result<RunReport, AnalysisError> {
        let started_at = Utc::now();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AnalysisError::io(path.display().to_string(), &e))?;
        let language = language
            .or_else(|| Language::detect(path, &text))
            .ok_or_else(|| AnalysisError::UnsupportedLanguage(path.display().to_string()))?;

        let file = self.analyze_source(path, language, text).await?;
        let cancelled = file.stats.cancelled > 0;
        let report = RunReport::new(vec![file], Vec::new(), started_at, cancelled);
        check_oracles(report.stats())?;
        Ok(report)
    }

    /// Analyze every matching file under `root` (or `root` itself if it is a file).
    pub async fn analyze_paths(&self, root: &Path) -> Result<RunReport, AnalysisError> {
        if root.is_file() {
            return self.analyze_file(root).await;
        }
        let files = self.discover(root)?;
        self.analyze_files(files, None).await
    }

    /// Files under `root` selected by the include and exclude patterns.
    ///
    /// Without include patterns only files with a supported extension are
    /// selected. Paths are matched relative to `root`.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
        let start = Instant::now();
        let filter = FileFilter::new(&self.config.include_patterns, &self.config.exclude_patterns)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == root {
                    return true;
                }
                let relative = e.path().strip_prefix(root).unwrap_or(e.path());
                !filter.excludes(relative, e.file_type().is_dir())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if filter.includes(relative) {
                files.push(entry.path().to_path_buf());
            }
        }

        debug!(root = %root.display(), files = files.len(), "Discovered files");

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("analyze.discover", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(files)
    }

    /// Analyze `files` with bounded parallelism.
    ///
    /// Unreadable files and files in no supported language are skipped
    /// and listed in the report. Fails with `OracleUnavailable` when oracle
    /// calls were made and every one of them failed.
    pub async fn analyze_files(
        &self,
        files: Vec<PathBuf>,
        progress: Option<ProgressFn>,
    ) -> Result<RunReport, AnalysisError> {
        let started_at = Utc::now();
        let cancel = self.cancellation();
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_files.max(1)));
        let mut tasks = JoinSet::new();

        for path in files {
            let analyzer = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = progress.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) if !cancel.is_cancelled() => analyzer.scan_one(&path).await,
                    _ => FileOutcome::Skipped(SkippedFile {
                        path: path.display().to_string(),
                        reason: "cancelled".to_string(),
                    }),
                };
                if let Some(progress) = progress {
                    progress(&path);
                }
                outcome
            });
        }

        let mut reports = Vec::new();
        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FileOutcome::Analyzed(report)) => reports.push(report),
                Ok(FileOutcome::Skipped(file)) => skipped.push(file),
                Err(e) => warn!(error = %e, "File task failed"),
            }
        }
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        let cancelled =
            cancel.is_cancelled() || reports.iter().any(|r: &FileReport| r.stats.cancelled > 0);
        if cancelled && reports.is_empty() {
            return Err(AnalysisError::Cancelled);
        }

        let report = RunReport::new(reports, skipped, started_at, cancelled);
        info!(
            run_id = %report.run_id,
            files = report.summary.files_analyzed,
            skipped = report.summary.files_skipped,
            findings = report.summary.findings,
            "Analysis finished"
        );
        check_oracles(report.stats())?;
        Ok(report)
    }

    async fn scan_one(&self, path: &Path) -> FileOutcome {
        let shown = path.display().to_string();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %shown, error = %e, "Skipping unreadable file");
                return FileOutcome::Skipped(SkippedFile {
                    path: shown,
                    reason: e.to_string(),
                });
            }
        };
        let Some(language) = Language::detect(path, &text) else {
            debug!(path = %shown, "Skipping file in unsupported language");
            return FileOutcome::Skipped(SkippedFile {
                path: shown,
                reason: "unsupported language".to_string(),
            });
        };
        match self.analyze_source(path, language, text).await {
            Ok(report) => FileOutcome::Analyzed(report),
            Err(e) => FileOutcome::Skipped(SkippedFile {
                path: shown,
                reason: e.to_string(),
            }),
        }
    }
}

enum FileOutcome {
    Analyzed(FileReport),
    Skipped(SkippedFile),
}

fn check_oracles(stats: &SynthesisStats) -> Result<(), AnalysisError> {
    if stats.all_failed() {
        warn!(calls = stats.calls, "Every oracle call failed");
        return Err(AnalysisError::OracleUnavailable { calls: stats.calls });
    }
    Ok(())
}

/// Include and exclude glob sets for directory scans.
struct FileFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
}

impl FileFilter {
    fn new(include: &[String], exclude: &[String]) -> Result<Self, AnalysisError> {
        Ok(Self {
            include: if include.is_empty() {
                None
            } else {
                Some(build_globset(include)?)
            },
            exclude: build_globset(exclude)?,
        })
    }

    fn excludes(&self, relative: &Path, is_dir: bool) -> bool {
        if self.exclude.is_match(relative) {
            return true;
        }
        // Directory patterns such as `**/vendor/**` match the contents, not the directory.
        is_dir && self.exclude.is_match(relative.join("_"))
    }

    fn includes(&self, relative: &Path) -> bool {
        match &self.include {
            Some(set) => set.is_match(relative),
            None => Language::from_path(relative).is_some(),
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, AnalysisError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| AnalysisError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| AnalysisError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::judge::{HeuristicJudge, Judgment, JudgmentContext};
    use crate::rag::{KnowledgeCorpus, LexicalRetriever, RulePassage};
    use crate::report::RuleCategory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const UNTERMINATED_GO: &str = r#"package main

func loadUser(ctx context.Context, id string) error {
	ctx, span := tracer.Start(ctx, "load user")
	if id == "" {
		return errors.New("missing id")
	}
	return nil
}
"#;

    struct DownJudge {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JudgmentOracle for DownJudge {
        fn name(&self) -> &str {
            "down"
        }

        async fn judge(
            &self,
            _context: &JudgmentContext,
            _passages: &[RulePassage],
        ) -> Result<Judgment, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OracleError::Unavailable("connection refused".to_string()))
        }
    }

    fn config() -> ResolvedConfig {
        ResolvedConfig {
            provider: "offline".to_string(),
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn offline_analyzer(config: ResolvedConfig) -> Analyzer {
        let corpus = Arc::new(KnowledgeCorpus::builtin());
        Analyzer::new(
            config,
            Arc::new(LexicalRetriever::new(corpus)),
            Arc::new(HeuristicJudge::new()),
        )
    }

    #[tokio::test]
    async fn test_analyze_source_reports_unterminated_span() {
        let analyzer = offline_analyzer(config());
        let report = analyzer
            .analyze_source("svc/user.go", Language::Go, UNTERMINATED_GO)
            .await
            .unwrap();

        assert_eq!(report.language, "go");
        let unterminated: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.has_category(RuleCategory::UnterminatedSpan))
            .collect();
        assert_eq!(unterminated.len(), 1);
        assert_eq!(unterminated[0].location.line, 4);
    }

    #[tokio::test]
    async fn test_analyze_file_unsupported_language() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "nothing to see here\n").unwrap();

        let analyzer = offline_analyzer(config());
        assert!(matches!(
            analyzer.analyze_file(&path).await,
            Err(AnalysisError::UnsupportedLanguage(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_file_missing() {
        let temp = TempDir::new().unwrap();
        let analyzer = offline_analyzer(config());
        assert!(matches!(
            analyzer.analyze_file(&temp.path().join("gone.go")).await,
            Err(AnalysisError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_discover_respects_patterns() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("svc")).unwrap();
        std::fs::create_dir_all(root.join("vendor/lib")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("svc/user.go"), UNTERMINATED_GO).unwrap();
        std::fs::write(root.join("svc/jobs.py"), "def run():\n    pass\n").unwrap();
        std::fs::write(root.join("svc/README.md"), "# svc\n").unwrap();
        std::fs::write(root.join("vendor/lib/dep.go"), "package lib\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "const x = 1;\n").unwrap();

        let analyzer = offline_analyzer(config());
        let files = analyzer.discover(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["svc/jobs.py", "svc/user.go"]);

        let analyzer = offline_analyzer(ResolvedConfig {
            include_patterns: vec!["**/*.go".to_string()],
            ..config()
        });
        assert_eq!(analyzer.discover(root).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let analyzer = offline_analyzer(ResolvedConfig {
            exclude_patterns: vec!["src/[".to_string()],
            ..config()
        });
        assert!(matches!(
            analyzer.discover(temp.path()),
            Err(AnalysisError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_analyze_paths_collects_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::write(root.join("user.go"), UNTERMINATED_GO).unwrap();
        std::fs::write(root.join("empty.py"), "x = 1\n").unwrap();

        let analyzer = offline_analyzer(config());
        let report = analyzer.analyze_paths(root).await.unwrap();
        assert_eq!(report.summary.files_analyzed, 2);
        assert!(!report.cancelled);
        assert!(report
            .findings()
            .any(|f| f.has_category(RuleCategory::UnterminatedSpan)));
        assert!(report.files[0].path < report.files[1].path);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped_by_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bad.go"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        std::fs::write(temp.path().join("user.go"), UNTERMINATED_GO).unwrap();

        let report = offline_analyzer(config())
            .analyze_paths(temp.path())
            .await
            .unwrap();
        assert_eq!(report.summary.files_analyzed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("bad.go"));
    }

    #[tokio::test]
    async fn test_all_oracle_failures_fail_the_run() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("handler.go");
        std::fs::write(
            &path,
            r#"package main

func parseUser(ctx context.Context) {
	ctx, span := tracer.Start(ctx, "parseUser")
	defer span.End()
}
"#,
        )
        .unwrap();

        let judge = Arc::new(DownJudge {
            calls: AtomicUsize::new(0),
        });
        let corpus = Arc::new(KnowledgeCorpus::builtin());
        let analyzer = Analyzer::new(
            config(),
            Arc::new(LexicalRetriever::new(corpus)),
            judge.clone(),
        );

        let result = analyzer.analyze_file(&path).await;
        assert!(matches!(result, Err(AnalysisError::OracleUnavailable { .. })));
        // Unavailable is not retryable: one attempt per candidate.
        assert!(judge.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancelled_scan_with_nothing_done() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("user.go"), UNTERMINATED_GO).unwrap();

        let analyzer = offline_analyzer(config());
        analyzer.cancellation().cancel();
        assert!(matches!(
            analyzer.analyze_paths(temp.path()).await,
            Err(AnalysisError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_progress_called_per_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.go"), UNTERMINATED_GO).unwrap();
        std::fs::write(temp.path().join("b.go"), UNTERMINATED_GO).unwrap();

        let analyzer = offline_analyzer(config());
        let files = analyzer.discover(temp.path()).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |_path: &Path| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        analyzer.analyze_files(files, Some(progress)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
