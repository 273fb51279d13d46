// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Retrieval query formulation.

use crate::context::{BoundaryKind, ContextHint};
use crate::judge::JudgmentContext;

/// Short natural-language query describing a candidate issue.
///
/// Built from the language, the category phrase, the call kind, the
/// scope classification, and any focus text. Identical contexts always
/// give identical queries.
pub fn formulate_query(ctx: &JudgmentContext) -> String {
    let mut parts: Vec<String> = vec![
        ctx.language.clone(),
        ctx.construct_kind.as_str().replace('_', " "),
        ctx.category.describe().to_string(),
    ];

    match ctx.boundary {
        BoundaryKind::Boundary => parts.push("service boundary handler".to_string()),
        BoundaryKind::Internal => parts.push("internal function".to_string()),
        BoundaryKind::Unknown => {}
    }
    if let Some(entry) = ctx.entry {
        parts.push(format!("{} entry point", entry.as_str()));
    }
    if ctx.loop_body {
        parts.push("inside loop".to_string());
    }
    if ctx.dynamic_name {
        parts.push("dynamic name".to_string());
    }
    if ctx.records_error && ctx.propagates_error {
        parts.push("records error and returns it".to_string());
    }
    if let Some(kind) = ctx.span_kind {
        parts.push(format!("span kind {}", kind.as_str()));
    }
    if ctx.hint != ContextHint::General {
        parts.push(ctx.hint.as_str().to_string());
    }
    if let Some(focus) = ctx.focus.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        parts.push(focus.to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SpanKindHint;
    use crate::lang::ConstructKind;
    use crate::report::RuleCategory;

    #[test]
    fn test_query_mentions_classification() {
        let mut ctx = JudgmentContext::new(
            RuleCategory::LoopBody,
            "python",
            "jobs.py",
            4,
            ConstructKind::SpanStart,
        );
        ctx.boundary = BoundaryKind::Internal;
        ctx.loop_body = true;
        ctx.span_kind = Some(SpanKindHint::Internal);
        ctx.hint = ContextHint::Database;
        ctx.focus = Some("  batch jobs ".to_string());

        let query = formulate_query(&ctx);
        assert!(query.starts_with("python span start span created inside loop"));
        assert!(query.contains("internal function"));
        assert!(query.contains("inside loop"));
        assert!(query.contains("database"));
        assert!(query.ends_with("batch jobs"));
        assert_eq!(query, formulate_query(&ctx));
    }
}
