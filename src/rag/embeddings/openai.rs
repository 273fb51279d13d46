// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI embedding provider.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::rag::types::EmbeddingVector;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::base::EmbeddingProvider;
use super::cache::EmbeddingCache;

const BATCH_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// OpenAI embedding provider.
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
    cache: Arc<EmbeddingCache>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider; the key falls back to `OPENAI_API_KEY`.
    pub fn new(model: &str, api_key: Option<&str>) -> Result<Self, KnowledgeError> {
        let api_key = match api_key {
            Some(key) => key.to_string(),
            None => std::env::var("OPENAI_API_KEY").map_err(|_| {
                KnowledgeError::Embedding("OPENAI_API_KEY environment variable not set".to_string())
            })?,
        };

        let dimensions = match model {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            dimensions,
            cache: Arc::new(EmbeddingCache::new()),
        })
    }

    /// Point the provider at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, KnowledgeError> {
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(KnowledgeError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, message
            )));
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| KnowledgeError::Embedding(format!("Failed to parse embedding response: {}", e)))?;
        if parsed.data.len() != texts.len() {
            return Err(KnowledgeError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.embeddings.openai.request", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(parsed
            .data
            .into_iter()
            .map(|d| EmbeddingVector::new(d.embedding))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, KnowledgeError> {
        let mut results: Vec<Option<EmbeddingVector>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<usize> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let cached = self.cache.get(&EmbeddingCache::make_key(self.name(), &self.model, text));
            if cached.is_none() {
                missing.push(i);
            }
            results.push(cached);
        }

        for batch in missing.chunks(BATCH_SIZE) {
            let inputs: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.request_embeddings(&inputs).await?;
            for (&i, vector) in batch.iter().zip(vectors) {
                self.cache.put(
                    EmbeddingCache::make_key(self.name(), &self.model, &texts[i]),
                    vector.clone(),
                );
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| KnowledgeError::Embedding("missing embedding".to_string())))
            .collect()
    }

    async fn is_available(&self) -> bool {
        self.request_embeddings(&["ping".to_string()]).await.is_ok()
    }
}
