// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Base trait for embedding providers.

use async_trait::async_trait;

use crate::error::KnowledgeError;
use crate::rag::types::{EmbeddingModelInfo, EmbeddingVector};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Embed several texts; the result has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, KnowledgeError>;

    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector, KnowledgeError> {
        let results = self.embed(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::Embedding("no embedding returned".to_string()))
    }

    /// Whether the provider answers at all.
    async fn is_available(&self) -> bool;

    fn model_info(&self) -> EmbeddingModelInfo {
        EmbeddingModelInfo {
            provider: self.name().to_string(),
            model: self.model().to_string(),
            dimensions: self.dimensions(),
            max_tokens: None,
        }
    }
}
