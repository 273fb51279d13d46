// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Embedding providers for semantic rule retrieval.

mod base;
mod cache;
mod ollama;
mod openai;

use std::sync::Arc;

pub use base::EmbeddingProvider;
pub use cache::EmbeddingCache;
pub use ollama::OllamaEmbeddingProvider;
pub use openai::OpenAIEmbeddingProvider;

use crate::error::KnowledgeError;
use crate::rag::types::{EmbeddingProviderType, RetrievalConfig};

/// Create the configured embedding provider.
pub async fn create_embedding_provider(
    config: &RetrievalConfig,
) -> Result<Arc<dyn EmbeddingProvider>, KnowledgeError> {
    match config.embedding_provider {
        EmbeddingProviderType::OpenAI => Ok(Arc::new(OpenAIEmbeddingProvider::new(
            &config.openai_model,
            None,
        )?)),
        EmbeddingProviderType::Ollama => Ok(Arc::new(OllamaEmbeddingProvider::new(
            &config.ollama_model,
            Some(&config.ollama_base_url),
        ))),
        EmbeddingProviderType::Auto => detect_and_create_provider(config).await,
    }
}

/// OpenAI when a key is set and works, otherwise a local Ollama.
pub async fn detect_and_create_provider(
    config: &RetrievalConfig,
) -> Result<Arc<dyn EmbeddingProvider>, KnowledgeError> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        let provider = OpenAIEmbeddingProvider::new(&config.openai_model, None)?;
        if provider.is_available().await {
            return Ok(Arc::new(provider));
        }
    }

    let provider = OllamaEmbeddingProvider::new(&config.ollama_model, Some(&config.ollama_base_url));
    if provider.is_available().await {
        return Ok(Arc::new(provider));
    }

    Err(KnowledgeError::Embedding(
        "No embedding provider available. Set OPENAI_API_KEY or run Ollama locally.".to_string(),
    ))
}
