// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! tracelint - telemetry instrumentation analyzer.
//!
//! Finds span, attribute, metric and error-recording anti-patterns in Go,
//! Python, JavaScript/TypeScript, Java and C# sources without compiling
//! them, and grounds every finding in a rule passage from a markdown
//! knowledge base.
//!
//! # Architecture
//!
//! A file flows through the following modules:
//!
//! - [`lang`] - Declarative per-language call shapes and syntax tables
//! - [`extract`] - Lexical extraction of telemetry call sites
//! - [`context`] - Span scope pairing, nesting, and boundary/loop classification
//! - [`rag`] - Rule corpus and the retrieval oracle (lexical or embeddings)
//! - [`judge`] - Judgment oracle (chat model or offline heuristics)
//! - [`synth`] - Candidate issues and bounded, retrying oracle calls
//! - [`report`] - Findings, deduplication, confidence merging, run summary
//! - [`analyzer`] - Per-file pipeline and directory scans
//!
//! Supporting modules:
//!
//! - [`config`] - Configuration loading and merging
//! - [`providers`] - Chat completion providers (Anthropic, OpenAI, Ollama)
//! - [`telemetry`] - Tracing setup and metrics
//! - [`cli`] - Terminal rendering
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracelint::{Analyzer, HeuristicJudge, KnowledgeCorpus, LexicalRetriever, Language};
//! use tracelint::config::ResolvedConfig;
//!
//! let corpus = Arc::new(KnowledgeCorpus::builtin());
//! let analyzer = Analyzer::new(
//!     ResolvedConfig::default(),
//!     Arc::new(LexicalRetriever::new(corpus)),
//!     Arc::new(HeuristicJudge::new()),
//! );
//! let report = analyzer.analyze_source("main.go", Language::Go, source).await?;
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod judge;
pub mod lang;
pub mod providers;
pub mod rag;
pub mod report;
pub mod synth;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use analyzer::{Analyzer, ProgressFn};
pub use error::{AnalysisError, ConfigError, KnowledgeError, OracleError, ProviderError, Result};
pub use extract::{extract, SourceUnit};
pub use judge::{HeuristicJudge, Judgment, JudgmentContext, JudgmentOracle, LlmJudge};
pub use lang::{Language, ProfileRegistry};
pub use rag::{KnowledgeCorpus, LexicalRetriever, RetrievalOracle, RulePassage};
pub use report::{FileReport, Finding, RuleCategory, RunReport, Severity};
pub use synth::{CancellationFlag, OraclePolicy, Synthesizer};

/// tracelint version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _corpus = KnowledgeCorpus::builtin();
        let _judge = HeuristicJudge::new();
        assert_eq!(Language::Go.as_str(), "go");
    }
}
