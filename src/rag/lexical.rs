// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lexical rule retrieval.
//!
//! BM25 over passage tokens, plus a boost for query terms that appear in
//! the passage's section heading, scaled by the passage kind weight. Needs
//! no network and gives the same ranking every run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::OracleError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::corpus::KnowledgeCorpus;
use super::types::RulePassage;
use super::RetrievalOracle;

const K1: f32 = 1.2;
const B: f32 = 0.75;
const SECTION_BOOST: f32 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "with",
];

struct IndexedPassage {
    terms: HashMap<String, u32>,
    section_terms: HashSet<String>,
    len: usize,
}

/// Token-overlap retriever over a [`KnowledgeCorpus`].
pub struct LexicalRetriever {
    corpus: Arc<KnowledgeCorpus>,
    index: Vec<IndexedPassage>,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
    min_score: f32,
}

impl LexicalRetriever {
    pub fn new(corpus: Arc<KnowledgeCorpus>) -> Self {
        let index: Vec<IndexedPassage> = corpus
            .passages()
            .iter()
            .map(|p| {
                let tokens = tokenize(&p.text);
                let mut terms = HashMap::new();
                for t in &tokens {
                    *terms.entry(t.clone()).or_insert(0) += 1;
                }
                IndexedPassage {
                    terms,
                    section_terms: p
                        .section
                        .as_deref()
                        .map(|s| tokenize(s).into_iter().collect())
                        .unwrap_or_default(),
                    len: tokens.len(),
                }
            })
            .collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for entry in &index {
            for term in entry.terms.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let total: usize = index.iter().map(|e| e.len).sum();
        let avg_len = if index.is_empty() {
            0.0
        } else {
            total as f32 / index.len() as f32
        };

        Self {
            corpus,
            index,
            doc_freq,
            avg_len,
            min_score: 0.0,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.index.len() as f32;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Rank passages for `text`; synchronous core of [`RetrievalOracle::query`].
    pub fn search(&self, text: &str, top_k: usize) -> Vec<RulePassage> {
        let mut query: Vec<String> = tokenize(text);
        query.sort();
        query.dedup();
        if query.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let passages = self.corpus.passages();
        let mut scored: Vec<(f32, usize)> = self
            .index
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let mut score = 0.0;
                for term in &query {
                    let idf = self.idf(term);
                    if let Some(&tf) = entry.terms.get(term) {
                        let tf = tf as f32;
                        let norm = 1.0 - B + B * entry.len as f32 / self.avg_len.max(1.0);
                        score += idf * tf * (K1 + 1.0) / (tf + K1 * norm);
                    }
                    if entry.section_terms.contains(term) {
                        score += SECTION_BOOST * idf;
                    }
                }
                let score = score * passages[i].kind.weight();
                (score > 0.0 && score >= self.min_score).then_some((score, i))
            })
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
impl RetrievalOracle for LexicalRetriever {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RulePassage>, OracleError> {
        let start = Instant::now();
        let results = self.search(text, top_k);

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.query", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(results)
    }
}

/// Lowercased alphanumeric words, camelCase split, stopwords dropped.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.extend(c.to_lowercase());
        } else {
            prev_lower = false;
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .into_iter()
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}
