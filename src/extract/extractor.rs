// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Call-site extraction.

use std::collections::HashSet;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::lexer::{call_close, scan_name_argument, Argument, Regions, ScanError};
use super::outline::Outline;
use super::source::SourceUnit;
use super::types::{Construct, Extraction, NameExpr, SkippedSite, SpanKindHint};
use crate::lang::{CompiledProfile, CompiledShape, ConstructKind};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

static SPAN_KIND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:Span|Activity)Kind(?:\.|_)?(Server|Client|Producer|Consumer|Internal)\b")
        .unwrap()
});

/// How far past a span start we look for a kind hint when the call cannot be
/// closed.
const KIND_LOOKAHEAD: usize = 400;

/// Extract telemetry constructs from one file.
///
/// Never fails: call sites whose arguments cannot be read are recorded in
/// [`Extraction::skipped`] and scanning continues with the next match.
pub fn extract(unit: &SourceUnit, profile: &CompiledProfile) -> Extraction {
    let start = Instant::now();
    let text = unit.text();
    let regions = Regions::scan(text, profile.profile);
    let outline = Outline::build(text, &regions, profile);

    let mut raw: Vec<Construct> = Vec::new();
    let mut skipped = Vec::new();
    let mut seen: HashSet<(ConstructKind, usize)> = HashSet::new();

    for shape in &profile.shapes {
        for caps in shape.regex.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if regions.is_masked(m.start()) {
                continue;
            }
            match read_site(unit, &regions, shape, &caps) {
                Ok(site) => {
                    if seen.insert((shape.kind, site.anchor)) {
                        raw.push(site.construct);
                    }
                }
                Err(reason) => {
                    let line = unit.line_of(m.start());
                    warn!(
                        path = %unit.display_path(),
                        line,
                        kind = shape.kind.as_str(),
                        reason = %reason,
                        "Skipping unreadable call site"
                    );
                    #[cfg(feature = "telemetry")]
                    GLOBAL_METRICS.increment_counter("extract.skip");
                    skipped.push(SkippedSite {
                        kind: shape.kind,
                        offset: m.start(),
                        line,
                        reason,
                    });
                }
            }
        }
    }

    let handles: HashSet<String> = raw
        .iter()
        .filter(|c| c.kind == ConstructKind::SpanStart)
        .filter_map(|c| c.handle.clone())
        .collect();
    raw.retain(|c| keeps(c, &handles));

    raw.sort_by_key(|c| (c.offset, c.kind));
    for (index, construct) in raw.iter_mut().enumerate() {
        construct.index = index;
        construct.block = outline.innermost_at(construct.offset);
    }
    skipped.sort_by_key(|s| s.offset);

    debug!(
        path = %unit.display_path(),
        constructs = raw.len(),
        skipped = skipped.len(),
        blocks = outline.blocks().len(),
        "Extracted constructs"
    );

    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.record_operation("extract", start.elapsed());
    #[cfg(not(feature = "telemetry"))]
    let _ = start;

    Extraction {
        constructs: raw,
        outline,
        regions,
        skipped,
    }
}

struct Site {
    construct: Construct,
    /// Position identifying the call site across overlapping shapes.
    anchor: usize,
}

fn read_site(
    unit: &SourceUnit,
    regions: &Regions,
    shape: &CompiledShape,
    caps: &Captures<'_>,
) -> Result<Site, String> {
    let text = unit.text();
    let Some(m) = caps.get(0) else {
        return Err("empty match".to_string());
    };

    let (name, end, anchor) = match shape.name_arg {
        Some(skip) => {
            let arg = name_argument(text, regions, m.end(), skip)?;
            let raw = &text[arg.start..arg.end];
            (Some(NameExpr::analyze(raw)), arg.end, arg.start)
        }
        None => (None, m.end(), m.end()),
    };

    let call_end = if shape.kind == ConstructKind::SpanStart {
        call_close(text, regions, m.end())
    } else {
        None
    };

    let span_kind = if shape.kind == ConstructKind::SpanStart {
        span_kind_hint(unit, end, call_end)
    } else {
        None
    };

    let (line, column) = unit.line_col(m.start());
    Ok(Site {
        construct: Construct {
            index: 0,
            kind: shape.kind,
            name,
            handle: caps.name("handle").map(|h| h.as_str().to_string()),
            receiver: caps.name("receiver").map(|r| r.as_str().to_string()),
            scope_style: shape.scope,
            deferred: caps.name("deferred").is_some(),
            span_kind,
            offset: m.start(),
            end,
            call_end,
            line,
            column,
            block: None,
        },
        anchor,
    })
}

/// Skip `skip` leading arguments and read the next one.
fn name_argument(
    text: &str,
    regions: &Regions,
    mut pos: usize,
    skip: usize,
) -> Result<Argument, String> {
    for _ in 0..skip {
        let arg = scan_name_argument(text, regions, pos).map_err(|e| e.as_str().to_string())?;
        if arg.closes_call {
            return Err("missing name argument".to_string());
        }
        pos = arg.terminator + 1;
    }
    let arg = scan_name_argument(text, regions, pos).map_err(|e: ScanError| e.as_str().to_string())?;
    if arg.start == arg.end {
        return Err("empty name argument".to_string());
    }
    Ok(arg)
}

/// Look for a span kind in the rest of the start call and in chained
/// builder lines that follow it.
fn span_kind_hint(unit: &SourceUnit, from: usize, call_end: Option<usize>) -> Option<SpanKindHint> {
    let text = unit.text();
    let mut to = call_end.map(|c| c + 1).unwrap_or_else(|| (from + KIND_LOOKAHEAD).min(text.len()));
    let mut line = unit.line_of(to.saturating_sub(1));
    while let Some(next) = unit.line_end(line + 1) {
        if !unit.line_text(line + 1).trim_start().starts_with('.') {
            break;
        }
        to = next;
        line += 1;
    }
    let window = text.get(from..to.max(from))?;
    SPAN_KIND
        .captures(window)
        .and_then(|c| c.get(1))
        .and_then(|m| SpanKindHint::parse(m.as_str()))
}

/// Drop look-alike calls made on objects that are not spans.
fn keeps(construct: &Construct, handles: &HashSet<String>) -> bool {
    let subject = match construct.kind {
        ConstructKind::SpanEnd => construct.handle.as_deref(),
        ConstructKind::AttributeSet
        | ConstructKind::EventAdd
        | ConstructKind::ErrorRecord
        | ConstructKind::StatusSet => construct.receiver.as_deref(),
        ConstructKind::SpanStart | ConstructKind::MetricInstrument => None,
    };
    subject.map_or(true, |s| looks_like_span(s, handles))
}

fn looks_like_span(subject: &str, handles: &HashSet<String>) -> bool {
    let lower = subject.to_ascii_lowercase();
    if lower.contains("span") || lower.contains("activity") {
        return true;
    }
    let last = subject
        .trim_end_matches("()")
        .rsplit('.')
        .next()
        .unwrap_or(subject);
    handles.contains(last)
}
