// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::path::PathBuf;

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub knowledge_base: Option<PathBuf>,
    /// `--offline` forces the heuristic judge and lexical retrieval.
    pub offline: bool,
    pub top_k: Option<usize>,
    pub confidence_threshold: Option<f32>,
    /// Replaces configured include patterns when non-empty.
    pub include_patterns: Vec<String>,
    /// Added to configured exclude patterns.
    pub exclude_patterns: Vec<String>,
    pub focus: Option<String>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.tracelint.local.json)
/// 3. Workspace config (.tracelint.json)
/// 4. Global config (~/.tracelint/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].iter().flatten() {
        apply_workspace_config(&mut result, config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref provider) = config.provider {
        result.provider = provider.clone();
    }

    if config.model.is_some() {
        result.model = config.model.clone();
    }

    if config.base_url.is_some() {
        result.base_url = config.base_url.clone();
    }

    if config.knowledge_base.is_some() {
        result.knowledge_base = config.knowledge_base.clone();
    }

    if let Some(mode) = config.retrieval {
        result.retrieval = mode;
    }

    if let Some(provider) = config.embedding_provider {
        result.embedding_provider = provider;
    }

    if let Some(top_k) = config.top_k {
        result.top_k = top_k;
    }

    if let Some(min_score) = config.min_score {
        result.min_score = min_score;
    }

    if let Some(n) = config.max_concurrency {
        result.max_concurrency = n;
    }

    if let Some(n) = config.max_parallel_files {
        result.max_parallel_files = n;
    }

    if let Some(ms) = config.oracle_timeout_ms {
        result.oracle_timeout_ms = ms;
    }

    if let Some(n) = config.max_retries {
        result.max_retries = n;
    }

    if let Some(ms) = config.retry_backoff_ms {
        result.retry_backoff_ms = ms;
    }

    if let Some(threshold) = config.confidence_threshold {
        result.confidence_threshold = threshold;
    }

    // A layer that names include or exclude patterns replaces the lists below it.
    if let Some(ref patterns) = config.include_patterns {
        result.include_patterns = patterns.clone();
    }

    if let Some(ref patterns) = config.exclude_patterns {
        result.exclude_patterns = patterns.clone();
    }

    if let Some(ref names) = config.entry_functions {
        for name in names {
            if !result.entry_functions.contains(name) {
                result.entry_functions.push(name.clone());
            }
        }
    }

    if config.focus.is_some() {
        result.focus = config.focus.clone();
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref provider) = cli.provider {
        result.provider = provider.clone();
    }

    if cli.offline {
        result.provider = "offline".to_string();
    }

    if cli.model.is_some() {
        result.model = cli.model.clone();
    }

    if cli.base_url.is_some() {
        result.base_url = cli.base_url.clone();
    }

    if cli.knowledge_base.is_some() {
        result.knowledge_base = cli.knowledge_base.clone();
    }

    if let Some(top_k) = cli.top_k {
        result.top_k = top_k;
    }

    if let Some(threshold) = cli.confidence_threshold {
        result.confidence_threshold = threshold;
    }

    if !cli.include_patterns.is_empty() {
        result.include_patterns = cli.include_patterns.clone();
    }

    for pattern in &cli.exclude_patterns {
        if !result.exclude_patterns.contains(pattern) {
            result.exclude_patterns.push(pattern.clone());
        }
    }

    if cli.focus.is_some() {
        result.focus = cli.focus.clone();
    }
}
