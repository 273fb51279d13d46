// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Semantic rule retrieval.
//!
//! Passages are embedded once, on the first query, and kept in memory for
//! the rest of the run.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{KnowledgeError, OracleError};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::corpus::KnowledgeCorpus;
use super::embeddings::EmbeddingProvider;
use super::types::{EmbeddingVector, RulePassage};
use super::RetrievalOracle;

const EMBED_BATCH: usize = 64;

/// Cosine-similarity retriever backed by an [`EmbeddingProvider`].
pub struct EmbeddingRetriever {
    corpus: Arc<KnowledgeCorpus>,
    provider: Arc<dyn EmbeddingProvider>,
    index: OnceCell<Vec<EmbeddingVector>>,
    min_score: f32,
}

impl EmbeddingRetriever {
    pub fn new(corpus: Arc<KnowledgeCorpus>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            corpus,
            provider,
            index: OnceCell::new(),
            min_score: 0.0,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    async fn build_index(&self) -> Result<Vec<EmbeddingVector>, KnowledgeError> {
        let start = Instant::now();
        let texts: Vec<String> = self.corpus.passages().iter().map(|p| p.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) {
            vectors.extend(self.provider.embed(batch).await?);
        }

        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            passages = vectors.len(),
            "Embedded knowledge base"
        );

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.index", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(vectors)
    }

    fn rank(&self, query: &EmbeddingVector, index: &[EmbeddingVector], top_k: usize) -> Vec<RulePassage> {
        let passages = self.corpus.passages();
        let mut scored: Vec<(f32, usize)> = index
            .iter()
            .enumerate()
            .map(|(i, v)| (query.cosine(v), i))
            .filter(|(score, _)| *score > 0.0 && *score >= self.min_score)
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| passages[a.1].id.cmp(&passages[b.1].id))
        });
        scored
            .into_iter()
            .take(top_k)
            .map(|(score, i)| RulePassage::from_passage(&passages[i], score))
            .collect()
    }
}

#[async_trait]
impl RetrievalOracle for EmbeddingRetriever {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RulePassage>, OracleError> {
        if self.corpus.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let index = self
            .index
            .get_or_try_init(|| self.build_index())
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let query = self
            .provider
            .embed_one(text)
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let results = self.rank(&query, index, top_k);
        debug!(query = text, results = results.len(), "Semantic rule query");

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.query", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(results)
    }
}
