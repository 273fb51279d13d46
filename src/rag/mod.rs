// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule retrieval over the instrumentation knowledge base.
//!
//! ```text
//!   knowledge/*.md ──► KnowledgeCorpus (chunked passages)
//!                             │
//!              ┌──────────────┴──────────────┐
//!              ▼                             ▼
//!      LexicalRetriever              EmbeddingRetriever
//!      (BM25, offline)               (OpenAI / Ollama vectors)
//!              └──────────────┬──────────────┘
//!                             ▼
//!                  dyn RetrievalOracle::query
//! ```
//!
//! The synthesizer only sees [`RetrievalOracle`]. An empty corpus or a query
//! with no matching passage yields an empty list, never an error.
//!
//! # Telemetry
//!
//! - `rag.corpus.load` - reading and chunking rule files
//! - `rag.index` - embedding the corpus
//! - `rag.query` - one retrieval query
//! - `rag.embeddings.*` - embedding requests

pub mod corpus;
pub mod embeddings;
pub mod lexical;
pub mod retriever;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{KnowledgeError, OracleError};

pub use corpus::{CorpusStats, KnowledgeCorpus};
pub use embeddings::{create_embedding_provider, EmbeddingProvider};
pub use lexical::LexicalRetriever;
pub use retriever::EmbeddingRetriever;
pub use types::{
    EmbeddingProviderType, EmbeddingVector, Passage, PassageKind, RetrievalConfig, RetrievalMode,
    RulePassage,
};

/// Query to ranked rule passages.
#[async_trait]
pub trait RetrievalOracle: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `top_k` passages, most relevant first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RulePassage>, OracleError>;
}

/// Build the retriever selected by `config.mode`.
///
/// `Auto` uses embeddings when a provider answers and falls back to lexical
/// ranking otherwise; `Semantic` fails when no provider is available.
pub async fn create_retriever(
    config: &RetrievalConfig,
    corpus: Arc<KnowledgeCorpus>,
) -> Result<Arc<dyn RetrievalOracle>, KnowledgeError> {
    let lexical = |corpus: Arc<KnowledgeCorpus>| -> Arc<dyn RetrievalOracle> {
        Arc::new(LexicalRetriever::new(corpus).with_min_score(config.min_score))
    };

    match config.mode {
        RetrievalMode::Lexical => Ok(lexical(corpus)),
        RetrievalMode::Semantic => {
            let provider = create_embedding_provider(config).await?;
            Ok(Arc::new(
                EmbeddingRetriever::new(corpus, provider).with_min_score(config.min_score),
            ))
        }
        RetrievalMode::Auto => match create_embedding_provider(config).await {
            Ok(provider) => {
                info!(provider = provider.name(), "Using semantic rule retrieval");
                Ok(Arc::new(
                    EmbeddingRetriever::new(corpus, provider).with_min_score(config.min_score),
                ))
            }
            Err(e) => {
                warn!(error = %e, "No embedding provider, using lexical rule retrieval");
                Ok(lexical(corpus))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lexical_mode_needs_no_provider() {
        let config = RetrievalConfig {
            mode: RetrievalMode::Lexical,
            ..Default::default()
        };
        let retriever = create_retriever(&config, Arc::new(KnowledgeCorpus::builtin()))
            .await
            .unwrap();
        assert_eq!(retriever.name(), "lexical");
        let results = retriever.query("span name camelCase", 3).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 3);
    }
}
