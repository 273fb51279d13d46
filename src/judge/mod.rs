// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Judgment oracles.
//!
//! A judge receives the serialized context of one candidate issue plus the
//! rule passages retrieved for it, and answers whether the rule is
//! violated. Two implementations ship:
//!
//! - [`LlmJudge`] asks a chat completion [`Provider`](crate::providers::Provider)
//! - [`HeuristicJudge`] applies fixed naming and structure rules offline
//!
//! Judges hold no per-call state and may be called concurrently.

mod heuristic;
mod llm;
mod types;

pub use heuristic::HeuristicJudge;
pub(crate) use heuristic::structural_judgment;
pub use llm::{parse_judgment, LlmJudge};
pub use types::{Judgment, JudgmentContext};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ResolvedConfig;
use crate::error::{OracleError, ProviderError};
use crate::providers::create_provider_from_config;
use crate::rag::RulePassage;

/// Decides whether a candidate issue is a real violation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &str;

    async fn judge(
        &self,
        context: &JudgmentContext,
        passages: &[RulePassage],
    ) -> Result<Judgment, OracleError>;
}

/// Create the judge selected by the configuration.
///
/// `offline` selects the heuristic judge; anything else builds a provider.
pub fn create_judge(config: &ResolvedConfig) -> Result<Arc<dyn JudgmentOracle>, ProviderError> {
    if config.is_offline() {
        return Ok(Arc::new(HeuristicJudge::new()));
    }
    let provider = create_provider_from_config(config)?;
    Ok(Arc::new(LlmJudge::new(provider)))
}
