// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Terminal presentation for the `tracelint` binary.

mod output;

pub use output::{
    render_corpus_stats, render_markdown, render_passages, render_report, render_summary,
    render_text, OutputFormat,
};
