// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Immutable source text with precomputed line offsets.

use std::path::{Path, PathBuf};

use crate::lang::Language;

/// One analyzed file. Created once per file and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    path: PathBuf,
    language: Language,
    text: String,
    line_offsets: Vec<usize>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, language: Language, text: impl Into<String>) -> Self {
        let mut text: String = text.into();
        if text.starts_with('\u{feff}') {
            text.drain(..'\u{feff}'.len_utf8());
        }
        let line_offsets = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            path: path.into(),
            language,
            text,
            line_offsets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path rendered for reports.
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// 1-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_offsets.partition_point(|&start| start <= offset).max(1)
    }

    /// 1-based (line, column) of a byte offset. Columns count characters.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let start = self.line_offsets[line - 1];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0)
            + 1;
        (line, column)
    }

    /// Byte offset where a 1-based line starts.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        line.checked_sub(1).and_then(|i| self.line_offsets.get(i).copied())
    }

    /// Byte offset just past the last character of a line (before `\n`).
    pub fn line_end(&self, line: usize) -> Option<usize> {
        let start = self.line_start(line)?;
        let end = self
            .line_offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        Some(end.max(start))
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: usize) -> &str {
        match (self.line_start(line), self.line_end(line)) {
            (Some(start), Some(end)) => self.text[start..end].trim_end_matches('\r'),
            _ => "",
        }
    }

    /// Lines `line - radius ..= line + radius`, joined with newlines.
    pub fn snippet(&self, line: usize, radius: usize) -> String {
        let first = line.saturating_sub(radius).max(1);
        let last = (line + radius).min(self.line_count());
        (first..=last)
            .map(|l| self.line_text(l))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
