// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Domain hint from the code around a span start.

use once_cell::sync::Lazy;
use regex::RegexSet;

use super::types::ContextHint;
use crate::extract::SourceUnit;

const LINES_BEFORE: usize = 5;
const LINES_AFTER: usize = 3;

static HTTP: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"http\.handler",
        r"gin\.context",
        r"router\.",
        r"handler\s*func",
        r"http\.request",
        r"http\.response",
        r"\.method\s*==",
        r"\breq\.",
        r"\bresp\.",
        r"\b(?:get|post|put|delete|patch)\s*/",
        r"endpoint",
        r"\bapi\b",
    ])
    .unwrap()
});

static DATABASE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"sql\.|\bdb\.|database",
        r"\b(?:query|select|insert|update|delete)\b",
        r"\b(?:prepare|execute)\b",
        r"\b(?:rows|tx|conn)\.",
        r"gorm\.",
        r"mongo|redis|postgres|mysql",
    ])
    .unwrap()
});

static MESSAGING: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"kafka|rabbitmq|pubsub|producer|consumer",
        r"\b(?:publish|subscribe)\b",
        r"\b(?:topic|queue)\b",
    ])
    .unwrap()
});

/// Classify lines around `line`. Messaging wins over database, and database
/// over HTTP, when several match.
pub fn context_hint(unit: &SourceUnit, line: usize) -> ContextHint {
    let first = line.saturating_sub(LINES_BEFORE).max(1);
    let last = (line + LINES_AFTER).min(unit.line_count());
    let window = (first..=last)
        .map(|l| unit.line_text(l))
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    if MESSAGING.is_match(&window) {
        ContextHint::Messaging
    } else if DATABASE.is_match(&window) {
        ContextHint::Database
    } else if HTTP.is_match(&window) {
        ContextHint::Http
    } else {
        ContextHint::General
    }
}
