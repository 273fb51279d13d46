// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stack-based span pairing and scope classification.

use std::collections::HashMap;
use std::time::Instant;

use regex::Regex;
use tracing::debug;

use super::hint::context_hint;
use super::types::{
    BoundaryKind, Classification, FileContext, FunctionFacts, ScopeId, SpanScope, Termination,
};
use crate::extract::{BlockId, Construct, Extraction, SourceUnit};
use crate::lang::{CompiledProfile, ConstructKind, ScopeStyle};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// An entry on the open-scope stack.
#[derive(Debug)]
struct Open {
    scope: ScopeId,
    style: ScopeStyle,
    /// Where an auto-closing or deferred scope closes.
    close_at: Option<usize>,
    /// Where an explicit scope is given up: its enclosing function's end.
    limit: usize,
}

impl Open {
    fn expired(&self, pos: usize) -> Option<usize> {
        match self.close_at {
            Some(close) if close < pos => Some(close),
            Some(_) => None,
            None if self.limit < pos => Some(self.limit),
            None => None,
        }
    }

    fn accepts_end(&self) -> bool {
        matches!(self.style, ScopeStyle::Explicit | ScopeStyle::Call)
    }
}

struct Builder<'a> {
    unit: &'a SourceUnit,
    extraction: &'a Extraction,
    profile: &'a CompiledProfile,
    ctx: FileContext,
    stack: Vec<Open>,
}

/// Pair span starts with their ends and attach every other construct to
/// the innermost open scope.
///
/// `entry_functions` extends the profile's designated entry functions.
pub fn build_context(
    unit: &SourceUnit,
    extraction: &Extraction,
    profile: &CompiledProfile,
    entry_functions: &[String],
) -> FileContext {
    let start = Instant::now();
    let count = extraction.constructs.len();
    let mut builder = Builder {
        unit,
        extraction,
        profile,
        ctx: FileContext {
            attachment: vec![None; count],
            depths: vec![0; count],
            ..Default::default()
        },
        stack: Vec::new(),
    };

    for construct in &extraction.constructs {
        builder.expire(construct.offset);
        builder.ctx.depths[construct.index] = builder.stack.len();
        match construct.kind {
            ConstructKind::SpanStart => builder.open(construct),
            ConstructKind::SpanEnd => builder.close(construct),
            ConstructKind::MetricInstrument => builder.ctx.instruments.push(construct.index),
            _ => builder.attach(construct),
        }
    }
    builder.expire(usize::MAX);

    let mut ctx = builder.ctx;
    classify(unit, extraction, profile, entry_functions, &mut ctx);
    link_error_flow(unit, extraction, profile, &mut ctx);

    debug!(
        path = %unit.display_path(),
        scopes = ctx.scopes.len(),
        unmatched = ctx.unmatched.len(),
        "Built file context"
    );

    #[cfg(feature = "telemetry")]
    GLOBAL_METRICS.record_operation("context.build", start.elapsed());
    #[cfg(not(feature = "telemetry"))]
    let _ = start;

    ctx
}

impl Builder<'_> {
    /// Pop every scope that closed before `pos`.
    fn expire(&mut self, pos: usize) {
        let text_len = self.unit.len();
        let mut i = self.stack.len();
        while i > 0 {
            i -= 1;
            let Some(at) = self.stack[i].expired(pos) else {
                continue;
            };
            let open = self.stack.remove(i);
            let scope = &mut self.ctx.scopes[open.scope];
            scope.close_offset = at.min(text_len);
            if scope.termination == Termination::BlockEnd && open.accepts_end() {
                scope.termination = Termination::Unterminated;
            }
        }
    }

    fn open(&mut self, construct: &Construct) {
        let id = self.ctx.scopes.len();
        let parent = self.stack.last().map(|o| o.scope);
        let text_len = self.unit.len();
        let outline = &self.extraction.outline;
        let line_end = self.unit.line_end(construct.line).unwrap_or(text_len);

        let limit = outline
            .enclosing_function(construct.offset)
            .map(|b| b.close)
            .unwrap_or(text_len);
        let close_at = match construct.scope_style {
            ScopeStyle::Explicit => None,
            ScopeStyle::Block => Some(
                outline
                    .block_opened_by(construct.offset)
                    .map(|b| b.close)
                    .unwrap_or(line_end),
            ),
            ScopeStyle::EnclosingBlock => Some(
                outline
                    .innermost_at(construct.offset)
                    .and_then(|b| outline.get(b))
                    .map(|b| b.close)
                    .unwrap_or(text_len),
            ),
            ScopeStyle::Call => Some(construct.call_end.unwrap_or(line_end)),
        };

        if let Some(p) = parent {
            self.ctx.scopes[p].children.push(id);
        }
        self.ctx.attachment[construct.index] = Some(id);
        self.ctx.scopes.push(SpanScope {
            id,
            start: construct.index,
            end: None,
            close_offset: text_len,
            depth: self.stack.len(),
            parent,
            children: Vec::new(),
            constructs: Vec::new(),
            function: None,
            classification: Classification {
                boundary: BoundaryKind::Unknown,
                entry: None,
                loop_body: false,
            },
            // Explicit scopes that never see an end are downgraded when they expire.
            termination: Termination::BlockEnd,
            early_exit: None,
            propagates_error: false,
            error_callers: Vec::new(),
            hint: context_hint(self.unit, construct.line),
        });
        self.stack.push(Open {
            scope: id,
            style: construct.scope_style,
            close_at,
            limit,
        });
    }

    fn close(&mut self, construct: &Construct) {
        let target = self
            .stack
            .iter()
            .rposition(|o| o.accepts_end() && self.ctx.scopes[o.scope].end.is_none());

        let Some(pos) = target else {
            // An end on a block-managed span (C# `using` plus `Dispose`).
            let owner = construct.handle.as_deref().and_then(|h| {
                self.stack.iter().rev().find(|o| {
                    let start = &self.extraction.constructs[self.ctx.scopes[o.scope].start];
                    start.handle.as_deref() == Some(h) && self.ctx.scopes[o.scope].end.is_none()
                })
            });
            match owner.map(|o| o.scope) {
                Some(scope) => {
                    self.ctx.scopes[scope].end = Some(construct.index);
                    self.ctx.attachment[construct.index] = Some(scope);
                }
                None => self.ctx.unmatched.push(construct.index),
            }
            return;
        };

        let scope_id = self.stack[pos].scope;
        self.ctx.attachment[construct.index] = Some(scope_id);
        let scope = &mut self.ctx.scopes[scope_id];
        scope.end = Some(construct.index);

        if construct.deferred {
            scope.termination = Termination::Deferred;
            let open = &mut self.stack[pos];
            if open.close_at.is_none() {
                open.close_at = Some(open.limit);
            }
        } else {
            scope.termination = Termination::Explicit;
            if self.stack[pos].style == ScopeStyle::Explicit {
                scope.close_offset = construct.offset;
                let start = scope.start;
                self.stack.remove(pos);
                if let Some(at) = self.exit_before(start, construct) {
                    let scope = &mut self.ctx.scopes[scope_id];
                    scope.termination = Termination::EarlyExit;
                    scope.early_exit = Some(at);
                }
            }
        }
    }

    /// First exit statement between a span start and its explicit end that
    /// leaves the start's function without running the end.
    fn exit_before(&self, start: usize, end: &Construct) -> Option<usize> {
        let start = &self.extraction.constructs[start];
        let from = start.end.min(end.offset);
        let region = self.unit.text().get(from..end.offset)?;
        let regions = &self.extraction.regions;
        let outline = &self.extraction.outline;
        let function = outline.enclosing_function(start.offset).map(|b| b.id);

        let unmasked = |at: usize| !regions.is_masked(from + at);
        if let Some(guard) = self.profile.exit_guard_in(region) {
            if unmasked(guard) {
                return None;
            }
        }
        self.profile
            .exits_in(region)
            .into_iter()
            .filter(|&at| unmasked(at))
            .map(|at| from + at)
            .find(|&at| outline.enclosing_function(at).map(|b| b.id) == function)
    }

    fn attach(&mut self, construct: &Construct) {
        match self.stack.last() {
            Some(open) => {
                let scope = open.scope;
                self.ctx.scopes[scope].constructs.push(construct.index);
                self.ctx.attachment[construct.index] = Some(scope);
            }
            None => self.ctx.unmatched.push(construct.index),
        }
    }
}

/// Fill in enclosing function, boundary, and loop classification.
fn classify(
    unit: &SourceUnit,
    extraction: &Extraction,
    profile: &CompiledProfile,
    entry_functions: &[String],
    ctx: &mut FileContext,
) {
    let outline = &extraction.outline;
    let mut functions: HashMap<BlockId, FunctionFacts> = HashMap::new();

    for i in 0..ctx.scopes.len() {
        let start = &extraction.constructs[ctx.scopes[i].start];

        // A span decorator applies to the function it decorates.
        let decorated = (start.scope_style == ScopeStyle::Block)
            .then(|| outline.block_opened_by(start.offset))
            .flatten()
            .filter(|b| b.is_function());
        let function = decorated.or_else(|| outline.enclosing_function(start.offset));

        let facts = function.map(|block| {
            functions
                .entry(block.id)
                .or_insert_with(|| {
                    let name = block.function_name().map(str::to_string);
                    let designated = name.as_deref().is_some_and(|n| {
                        profile.is_entry_function(n) || entry_functions.iter().any(|e| e == n)
                    });
                    FunctionFacts {
                        block: block.id,
                        name,
                        signature: block.signature.clone(),
                        entry: profile.entry_kind(&block.signature),
                        designated,
                    }
                })
                .clone()
        });

        let outermost_in_function = {
            let mut parent = ctx.scopes[i].parent;
            let mut outermost = true;
            while let Some(p) = parent {
                if ctx.scopes[p].function == function.map(|b| b.id) {
                    outermost = false;
                    break;
                }
                parent = ctx.scopes[p].parent;
            }
            outermost
        };

        let boundary = match &facts {
            None => BoundaryKind::Unknown,
            Some(f) if f.entry.is_some() => BoundaryKind::Boundary,
            Some(f) if f.designated && outermost_in_function => BoundaryKind::Boundary,
            Some(_) => BoundaryKind::Internal,
        };

        let scope = &mut ctx.scopes[i];
        scope.function = function.map(|b| b.id);
        scope.classification = Classification {
            boundary,
            entry: facts.as_ref().and_then(|f| f.entry),
            loop_body: outline.in_loop(start.offset),
        };
    }

    let mut functions: Vec<FunctionFacts> = functions.into_values().collect();
    functions.sort_by_key(|f| f.block);
    ctx.functions = functions;

    debug!(path = %unit.display_path(), functions = ctx.functions.len(), "Classified scopes");
}

/// Mark scopes whose recorded error leaves the function, and find scopes
/// in calling functions that record it again.
fn link_error_flow(
    unit: &SourceUnit,
    extraction: &Extraction,
    profile: &CompiledProfile,
    ctx: &mut FileContext,
) {
    let text = unit.text();
    let outline = &extraction.outline;

    for i in 0..ctx.scopes.len() {
        let propagates = ctx
            .attached(extraction, i, ConstructKind::ErrorRecord)
            .any(|record| {
                let until = outline
                    .enclosing_function(record.offset)
                    .map(|b| b.close)
                    .unwrap_or(text.len());
                let err = record.name.as_ref().map(|n| n.raw.as_str()).unwrap_or("");
                text.get(record.end..until)
                    .is_some_and(|region| profile.propagates_error(region, err))
            });
        ctx.scopes[i].propagates_error = propagates;
    }

    for i in 0..ctx.scopes.len() {
        if !ctx.scopes[i].propagates_error {
            continue;
        }
        let Some(name) = ctx.scopes[i]
            .function
            .and_then(|b| ctx.function(b))
            .and_then(|f| f.name.clone())
        else {
            continue;
        };
        let Ok(call) = Regex::new(&format!(r"\b{}\s*\(", regex::escape(&name))) else {
            continue;
        };

        let own_function = ctx.scopes[i].function;
        let callers: Vec<ScopeId> = ctx
            .scopes
            .iter()
            .filter(|s| s.id != i && s.function != own_function)
            .filter(|s| ctx.records_error(extraction, s.id))
            .filter(|s| {
                let from = extraction.constructs[s.start].offset;
                let to = s.close_offset.min(text.len());
                text.get(from..to).is_some_and(|range| {
                    call.find_iter(range)
                        .any(|m| !extraction.regions.is_masked(from + m.start()))
                })
            })
            .map(|s| s.id)
            .collect();
        ctx.scopes[i].error_callers = callers;
    }
}
