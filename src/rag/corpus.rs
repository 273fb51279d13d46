// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule corpus loading and chunking.
//!
//! Markdown rule files are split several ways at once so that both a whole
//! rule section and a single good/bad line can be retrieved:
//! rule sections under `###`/`####` headings, good and bad pattern lines,
//! fenced code examples, anti-pattern sections, and overlapping text
//! windows as a fallback.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::KnowledgeError;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::types::{Passage, PassageKind};

/// Window size for fallback text chunks, in characters.
const WINDOW_SIZE: usize = 512;
/// Overlap between consecutive windows, in characters.
const WINDOW_OVERLAP: usize = 50;

const BUILTIN_SOURCE: &str = "builtin:instrumentation.md";
const BUILTIN_TEXT: &str = include_str!("../../knowledge/instrumentation.md");

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,4})[ \t]+(.+?)[ \t]*$").unwrap());
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static GOOD_BAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*][ \t]+)?(?P<mark>✅|❌|Good:|Bad:|GOOD:|BAD:).*$").unwrap()
});

struct Heading {
    start: usize,
    body_start: usize,
    level: usize,
    title: String,
}

/// Summary of a loaded corpus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub files: usize,
    pub passages: usize,
    pub by_kind: BTreeMap<PassageKind, usize>,
}

/// The rule corpus, read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeCorpus {
    sources: Vec<String>,
    passages: Vec<Passage>,
}

impl KnowledgeCorpus {
    /// An empty corpus; every query against it returns nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The corpus shipped with the binary.
    pub fn builtin() -> Self {
        let mut corpus = Self::empty();
        corpus.add_markdown(BUILTIN_SOURCE, BUILTIN_TEXT);
        corpus
    }

    /// Load every markdown file under `path`, or `path` itself when it is a file.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let start = Instant::now();
        if !path.exists() {
            return Err(KnowledgeError::NotFound(path.display().to_string()));
        }

        let mut files: Vec<_> = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
                })
                .collect()
        };
        files.sort();

        let mut corpus = Self::empty();
        for file in files {
            let text = std::fs::read(&file).map_err(|e| KnowledgeError::ReadFailed {
                path: file.display().to_string(),
                message: e.to_string(),
            })?;
            let text = String::from_utf8_lossy(&text);
            let source = file
                .strip_prefix(path)
                .ok()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(file.as_path())
                .display()
                .to_string();
            corpus.add_markdown(&source, &text);
        }

        info!(
            path = %path.display(),
            files = corpus.sources.len(),
            passages = corpus.passages.len(),
            "Loaded knowledge base"
        );

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("rag.corpus.load", start.elapsed());
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        Ok(corpus)
    }

    /// Chunk one markdown document into the corpus.
    pub fn add_markdown(&mut self, source: &str, text: &str) {
        let before = self.passages.len();
        let headings = headings(text);
        let section_at = |offset: usize| -> Option<String> {
            headings
                .iter()
                .rev()
                .find(|h| h.start <= offset)
                .map(|h| h.title.clone())
        };
        let mut push = |kind: PassageKind, offset: usize, body: &str, section: Option<String>| {
            let body = body.trim();
            if body.is_empty() {
                return;
            }
            self.passages.push(Passage {
                id: Passage::generate_id(source, kind, offset),
                kind,
                source: source.to_string(),
                section,
                text: body.to_string(),
            });
        };

        for (i, h) in headings.iter().enumerate() {
            if h.level >= 3 {
                let end = headings[i + 1..]
                    .iter()
                    .find(|n| n.level <= 4)
                    .map(|n| n.start)
                    .unwrap_or(text.len());
                let body = format!("{}\n{}", h.title, &text[h.body_start..end]);
                push(PassageKind::Rule, h.start, &body, Some(h.title.clone()));
            }
            if h.title.to_lowercase().contains("anti-pattern") {
                let end = headings[i + 1..]
                    .iter()
                    .find(|n| n.level <= h.level.max(3))
                    .map(|n| n.start)
                    .unwrap_or(text.len());
                push(PassageKind::AntiPattern, h.start, &text[h.start..end], Some(h.title.clone()));
            }
        }

        for m in GOOD_BAD.find_iter(text) {
            let kind = if m.as_str().contains('✅') || m.as_str().to_lowercase().contains("good:") {
                PassageKind::GoodPattern
            } else {
                PassageKind::BadPattern
            };
            push(kind, m.start(), m.as_str(), section_at(m.start()));
        }

        for m in FENCE.find_iter(text) {
            push(PassageKind::Example, m.start(), m.as_str(), section_at(m.start()));
        }

        for (offset, window) in windows(text) {
            push(PassageKind::TextChunk, offset, window, section_at(offset));
        }

        debug!(source, passages = self.passages.len() - before, "Chunked knowledge file");
        self.sources.push(source.to_string());
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn get(&self, id: &str) -> Option<&Passage> {
        self.passages.iter().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn stats(&self) -> CorpusStats {
        let mut by_kind = BTreeMap::new();
        for p in &self.passages {
            *by_kind.entry(p.kind).or_insert(0) += 1;
        }
        CorpusStats {
            files: self.sources.len(),
            passages: self.passages.len(),
            by_kind,
        }
    }
}

fn headings(text: &str) -> Vec<Heading> {
    let fences: Vec<(usize, usize)> = FENCE.find_iter(text).map(|m| (m.start(), m.end())).collect();
    HEADING
        .captures_iter(text)
        .filter_map(|c| {
            let m = c.get(0)?;
            if fences.iter().any(|&(s, e)| s <= m.start() && m.start() < e) {
                return None;
            }
            Some(Heading {
                start: m.start(),
                body_start: m.end(),
                level: c.get(1)?.as_str().len(),
                title: c.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

/// Overlapping windows of at most `WINDOW_SIZE` characters, preferring to
/// break at paragraph, line, then word boundaries.
fn windows(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let hard_end = text[start..]
            .char_indices()
            .nth(WINDOW_SIZE)
            .map(|(i, _)| start + i)
            .unwrap_or(text.len());
        let end = if hard_end == text.len() {
            hard_end
        } else {
            let slice = &text[start..hard_end];
            let min = slice.len() / 2;
            ["\n\n", "\n", " "]
                .iter()
                .find_map(|sep| slice.rfind(sep).filter(|&p| p > min).map(|p| start + p))
                .unwrap_or(hard_end)
        };
        out.push((start, &text[start..end]));
        if end >= text.len() {
            break;
        }
        let back = text[..end]
            .char_indices()
            .rev()
            .nth(WINDOW_OVERLAP.saturating_sub(1))
            .map(|(i, _)| i)
            .unwrap_or(start);
        start = if back > start { back } else { end };
    }
    out
}
