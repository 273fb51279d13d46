// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Query embedding cache.
//!
//! Constructs with the same name and category produce the same retrieval
//! query, so a run embeds far fewer distinct texts than it issues queries.
//! Entries are evicted least-recently-used once the cache is full.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::rag::types::EmbeddingVector;

const DEFAULT_MAX_SIZE: usize = 1000;

struct CacheEntry {
    embedding: EmbeddingVector,
    last_accessed: Instant,
}

/// Thread-safe embedding cache.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }

    /// Key for a text under a given provider and model.
    pub fn make_key(provider: &str, model: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        format!("{}:{}:{}", provider, model, &hash[..16])
    }

    pub fn get(&self, key: &str) -> Option<EmbeddingVector> {
        let mut entries = self.entries.write().ok()?;
        let entry = entries.get_mut(key)?;
        entry.last_accessed = Instant::now();
        Some(entry.embedding.clone())
    }

    pub fn put(&self, key: String, embedding: EmbeddingVector) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                embedding,
                last_accessed: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        let key1 = EmbeddingCache::make_key("openai", "text-embedding-3-small", "span naming");
        let key2 = EmbeddingCache::make_key("openai", "text-embedding-3-small", "span naming");
        let key3 = EmbeddingCache::make_key("openai", "text-embedding-3-small", "metric naming");
        let key4 = EmbeddingCache::make_key("ollama", "nomic-embed-text", "span naming");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
    }

    #[test]
    fn test_cache_put_get() {
        let cache = EmbeddingCache::new();
        cache.put("k".to_string(), EmbeddingVector::new(vec![1.0, 2.0]));
        assert_eq!(cache.get("k").unwrap().values, vec![1.0, 2.0]);
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = EmbeddingCache::with_capacity(2);
        cache.put("a".to_string(), EmbeddingVector::new(vec![1.0]));
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.put("b".to_string(), EmbeddingVector::new(vec![2.0]));
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.get("a");
        cache.put("c".to_string(), EmbeddingVector::new(vec![3.0]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }
}
