// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Types for rule retrieval.

use serde::{Deserialize, Serialize};

/// What a corpus passage holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageKind {
    /// A `###`/`####` rule section.
    Rule,
    /// A single `✅`/`Good:` line.
    GoodPattern,
    /// A single `❌`/`Bad:` line.
    BadPattern,
    /// A fenced code example.
    Example,
    /// An anti-pattern section.
    AntiPattern,
    /// A fixed-size text window.
    TextChunk,
}

impl PassageKind {
    pub const ALL: [PassageKind; 6] = [
        Self::Rule,
        Self::GoodPattern,
        Self::BadPattern,
        Self::Example,
        Self::AntiPattern,
        Self::TextChunk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::GoodPattern => "good_pattern",
            Self::BadPattern => "bad_pattern",
            Self::Example => "example",
            Self::AntiPattern => "anti_pattern",
            Self::TextChunk => "text_chunk",
        }
    }

    /// Score multiplier used by lexical ranking.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Rule | Self::AntiPattern => 1.2,
            Self::GoodPattern | Self::BadPattern => 1.1,
            Self::Example => 0.9,
            Self::TextChunk => 0.8,
        }
    }
}

impl std::fmt::Display for PassageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chunk of the rule corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable id derived from source and offset.
    pub id: String,
    pub kind: PassageKind,
    /// File the passage came from.
    pub source: String,
    /// Nearest heading above the passage.
    pub section: Option<String>,
    pub text: String,
}

impl Passage {
    pub fn generate_id(source: &str, kind: PassageKind, offset: usize) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", source, kind.as_str(), offset).as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        hash[..12].to_string()
    }
}

/// A ranked passage returned by a retrieval query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePassage {
    pub id: String,
    pub text: String,
    /// Higher is more relevant; the scale depends on the retriever.
    pub score: f32,
    pub source: String,
    pub section: Option<String>,
}

impl RulePassage {
    pub fn from_passage(passage: &Passage, score: f32) -> Self {
        Self {
            id: passage.id.clone(),
            text: passage.text.clone(),
            score,
            source: passage.source.clone(),
            section: passage.section.clone(),
        }
    }
}

/// How passages are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Embeddings when a provider is reachable, otherwise lexical.
    #[default]
    Auto,
    Lexical,
    Semantic,
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI embedding API.
    OpenAI,
    /// Ollama local embeddings.
    Ollama,
    /// Auto-detect available provider.
    #[default]
    Auto,
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,
    pub embedding_provider: EmbeddingProviderType,
    /// OpenAI embedding model.
    pub openai_model: String,
    /// Ollama embedding model.
    pub ollama_model: String,
    /// Ollama base URL.
    pub ollama_base_url: String,
    /// Number of passages per query.
    pub top_k: usize,
    /// Minimum score a passage needs to be returned.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Auto,
            embedding_provider: EmbeddingProviderType::Auto,
            openai_model: "text-embedding-3-small".to_string(),
            ollama_model: "nomic-embed-text".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            top_k: 3,
            min_score: 0.0,
        }
    }
}

/// Embedding vector with metadata.
#[derive(Debug, Clone)]
pub struct EmbeddingVector {
    /// The embedding values.
    pub values: Vec<f32>,
    /// Dimension count.
    pub dimensions: usize,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        let dimensions = values.len();
        Self { values, dimensions }
    }

    /// Cosine similarity; 0.0 for mismatched or zero vectors.
    pub fn cosine(&self, other: &EmbeddingVector) -> f32 {
        let (a, b) = (&self.values, &other.values);
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

/// Information about an embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelInfo {
    /// Provider name.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Vector dimensions.
    pub dimensions: usize,
    /// Maximum tokens per request.
    pub max_tokens: Option<usize>,
}
