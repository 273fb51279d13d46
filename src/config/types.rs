// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! `WorkspaceConfig` is the on-disk shape (JSON or YAML, camelCase, every
//! field optional). `ResolvedConfig` is the merged result with defaults
//! filled in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rag::{EmbeddingProviderType, RetrievalConfig, RetrievalMode};
use crate::synth::OraclePolicy;

/// Providers accepted in configuration files and on the command line.
pub const PROVIDERS: &[&str] = &["auto", "openai", "anthropic", "ollama", "offline"];

/// Excluded from directory scans unless overridden.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/vendor/**",
    "**/node_modules/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/__pycache__/**",
    "**/bin/**",
    "**/obj/**",
];

/// Configuration as written in `.tracelint.json` and friends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Judge provider (auto, openai, anthropic, ollama, offline)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Custom base URL for the judge API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Rule corpus: a directory of markdown files or a single file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<EmbeddingProviderType>,

    /// Passages retrieved per candidate issue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,

    /// Concurrent oracle calls per file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Files analyzed at once during a scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_files: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,

    /// Findings below this confidence are not reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,

    /// Extra function names treated as service entry points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_functions: Option<Vec<String>>,

    /// Free text appended to every retrieval query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub knowledge_base: Option<PathBuf>,
    pub retrieval: RetrievalMode,
    pub embedding_provider: EmbeddingProviderType,
    pub top_k: usize,
    pub min_score: f32,
    pub max_concurrency: usize,
    pub max_parallel_files: usize,
    pub oracle_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub confidence_threshold: f32,
    /// Empty means every file with a supported extension.
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub entry_functions: Vec<String>,
    pub focus: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            provider: "auto".to_string(),
            model: None,
            base_url: None,
            knowledge_base: None,
            retrieval: RetrievalMode::Auto,
            embedding_provider: EmbeddingProviderType::Auto,
            top_k: 3,
            min_score: 0.0,
            max_concurrency: 4,
            max_parallel_files: 4,
            oracle_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            confidence_threshold: 0.0,
            include_patterns: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            entry_functions: Vec::new(),
            focus: None,
        }
    }
}

impl ResolvedConfig {
    /// Judge with the offline heuristic oracle instead of a chat model.
    pub fn is_offline(&self) -> bool {
        self.provider.eq_ignore_ascii_case("offline")
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        let mut config = RetrievalConfig {
            mode: self.retrieval,
            embedding_provider: self.embedding_provider,
            top_k: self.top_k,
            min_score: self.min_score,
            ..Default::default()
        };
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.ollama_base_url = host.trim_end_matches('/').to_string();
        }
        // Offline runs never reach for an embedding endpoint.
        if self.is_offline() && config.mode == RetrievalMode::Auto {
            config.mode = RetrievalMode::Lexical;
        }
        config
    }

    pub fn oracle_policy(&self) -> OraclePolicy {
        OraclePolicy::default()
            .with_timeout(Duration::from_millis(self.oracle_timeout_ms))
            .with_retries(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
            .with_max_concurrency(self.max_concurrency)
    }

    /// Reject values that cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PROVIDERS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&self.provider))
        {
            return Err(invalid(
                "provider",
                format!("'{}' is not one of {}", self.provider, PROVIDERS.join(", ")),
            ));
        }
        if self.top_k == 0 {
            return Err(invalid("topK", "must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(invalid("maxConcurrency", "must be at least 1".to_string()));
        }
        if self.max_parallel_files == 0 {
            return Err(invalid("maxParallelFiles", "must be at least 1".to_string()));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(invalid("oracleTimeoutMs", "must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "confidenceThreshold",
                format!("{} is outside [0, 1]", self.confidence_threshold),
            ));
        }
        if !self.min_score.is_finite() {
            return Err(invalid("minScore", "must be a finite number".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_config_camel_case() {
        let config: WorkspaceConfig = serde_json::from_str(
            r#"{
                "provider": "offline",
                "knowledgeBase": "docs/rules",
                "retrieval": "lexical",
                "embeddingProvider": "ollama",
                "topK": 5,
                "maxParallelFiles": 2,
                "oracleTimeoutMs": 1000,
                "confidenceThreshold": 0.5,
                "entryFunctions": ["handle"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.provider.as_deref(), Some("offline"));
        assert_eq!(config.knowledge_base, Some(PathBuf::from("docs/rules")));
        assert_eq!(config.retrieval, Some(RetrievalMode::Lexical));
        assert_eq!(config.embedding_provider, Some(EmbeddingProviderType::Ollama));
        assert_eq!(config.top_k, Some(5));
        assert_eq!(config.max_parallel_files, Some(2));
        assert_eq!(config.entry_functions, Some(vec!["handle".to_string()]));
    }

    #[test]
    fn test_workspace_config_yaml() {
        let config: WorkspaceConfig =
            serde_yaml::from_str("provider: anthropic\nmaxRetries: 4\nfocus: payments\n").unwrap();
        assert_eq!(config.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.max_retries, Some(4));
        assert_eq!(config.focus.as_deref(), Some("payments"));
    }

    #[test]
    fn test_skip_none_on_save() {
        let json = serde_json::to_string(&WorkspaceConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.provider, "auto");
        assert_eq!(config.top_k, 3);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.oracle_timeout_ms, 30_000);
        assert!(config.exclude_patterns.iter().any(|p| p.contains("node_modules")));
        assert!(!config.is_offline());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oracle_policy_from_config() {
        let config = ResolvedConfig {
            oracle_timeout_ms: 1500,
            max_retries: 5,
            retry_backoff_ms: 10,
            max_concurrency: 0,
            ..Default::default()
        };
        let policy = config.oracle_policy();
        assert_eq!(policy.timeout, Duration::from_millis(1500));
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff, Duration::from_millis(10));
        assert_eq!(policy.max_concurrency, 1);
    }

    #[test]
    fn test_offline_retrieval_is_lexical() {
        let config = ResolvedConfig {
            provider: "OFFLINE".to_string(),
            top_k: 7,
            ..Default::default()
        };
        assert!(config.is_offline());
        let retrieval = config.retrieval_config();
        assert_eq!(retrieval.mode, RetrievalMode::Lexical);
        assert_eq!(retrieval.top_k, 7);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ResolvedConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "provider"
        ));

        let config = ResolvedConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResolvedConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
