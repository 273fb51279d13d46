// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ollama embedding provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::KnowledgeError;
use crate::rag::types::EmbeddingVector;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::base::EmbeddingProvider;
use super::cache::EmbeddingCache;

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama embedding provider. Ollama embeds one prompt per request, so
/// batches fan out under a small concurrency limit.
pub struct OllamaEmbeddingProvider {
    client: Client,
    model: String,
    base_url: String,
    dimensions: AtomicUsize,
    cache: Arc<EmbeddingCache>,
    permits: Arc<Semaphore>,
}

impl OllamaEmbeddingProvider {
    const DEFAULT_DIMENSIONS: usize = 768;
    const MAX_CONCURRENT_REQUESTS: usize = 5;

    pub fn new(model: &str, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/');

        let dimensions = match model {
            "mxbai-embed-large" | "snowflake-arctic-embed" => 1024,
            "all-minilm" => 384,
            _ => Self::DEFAULT_DIMENSIONS,
        };

        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            dimensions: AtomicUsize::new(dimensions),
            cache: Arc::new(EmbeddingCache::new()),
            permits: Arc::new(Semaphore::new(Self::MAX_CONCURRENT_REQUESTS)),
        }
    }

    async fn request_embedding(
        client: Client,
        url: String,
        model: String,
        text: String,
        permits: Arc<Semaphore>,
    ) -> Result<EmbeddingVector, KnowledgeError> {
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("request permit: {}", e)))?;

        let response = client
            .post(url)
            .json(&EmbeddingRequest { model, prompt: text })
            .send()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KnowledgeError::Embedding(format!("Failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(KnowledgeError::Embedding(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| KnowledgeError::Embedding(format!("Failed to parse embedding response: {}", e)))?;
        Ok(EmbeddingVector::new(parsed.embedding))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::SeqCst)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, KnowledgeError> {
        let start = Instant::now();
        let mut results: Vec<Option<EmbeddingVector>> = texts
            .iter()
            .map(|t| self.cache.get(&EmbeddingCache::make_key(self.name(), &self.model, t)))
            .collect();

        let mut tasks = JoinSet::new();
        for (i, text) in texts.iter().enumerate().filter(|(i, _)| results[*i].is_none()) {
            let fut = Self::request_embedding(
                self.client.clone(),
                format!("{}/api/embeddings", self.base_url),
                self.model.clone(),
                text.clone(),
                self.permits.clone(),
            );
            tasks.spawn(async move { (i, fut.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let (i, result) =
                joined.map_err(|e| KnowledgeError::Embedding(format!("embedding task failed: {}", e)))?;
            let vector = result?;
            if vector.dimensions > 0 {
                self.dimensions.store(vector.dimensions, Ordering::SeqCst);
            }
            self.cache.put(
                EmbeddingCache::make_key(self.name(), &self.model, &texts[i]),
                vector.clone(),
            );
            results[i] = Some(vector);
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.embeddings.ollama.embed", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| KnowledgeError::Embedding("missing embedding".to_string())))
            .collect()
    }

    async fn is_available(&self) -> bool {
        let Ok(resp) = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        else {
            return false;
        };
        if !resp.status().is_success() {
            return false;
        }
        match resp.json::<TagsResponse>().await {
            Ok(tags) => tags
                .models
                .iter()
                .any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model))),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_dimensions() {
        assert_eq!(OllamaEmbeddingProvider::new("nomic-embed-text", None).dimensions(), 768);
        assert_eq!(OllamaEmbeddingProvider::new("mxbai-embed-large", None).dimensions(), 1024);
        assert_eq!(OllamaEmbeddingProvider::new("all-minilm", None).dimensions(), 384);
    }

    #[test]
    fn test_custom_base_url() {
        let provider = OllamaEmbeddingProvider::new("test", Some("http://custom:8080/"));
        assert_eq!(provider.base_url, "http://custom:8080");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let provider = OllamaEmbeddingProvider::new("nomic-embed-text", Some("http://127.0.0.1:9"));
        assert!(!provider.is_available().await);
    }
}
