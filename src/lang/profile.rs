// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Profile data types and the compiled profile registry.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{tables, Language};

/// Kind of telemetry call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    SpanStart,
    SpanEnd,
    AttributeSet,
    EventAdd,
    ErrorRecord,
    StatusSet,
    MetricInstrument,
}

impl ConstructKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpanStart => "span_start",
            Self::SpanEnd => "span_end",
            Self::AttributeSet => "attribute_set",
            Self::EventAdd => "event_add",
            Self::ErrorRecord => "error_record",
            Self::StatusSet => "status_set",
            Self::MetricInstrument => "metric_instrument",
        }
    }

    /// Constructs that must sit inside an open span.
    pub fn needs_scope(&self) -> bool {
        matches!(
            self,
            Self::AttributeSet | Self::EventAdd | Self::ErrorRecord | Self::StatusSet
        )
    }
}

/// How a span opened by a call site is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStyle {
    /// Closed by a matching span-end call.
    Explicit,
    /// Closed by the end of the block the start statement opens
    /// (`with`, `using (...) {}`, span decorators).
    Block,
    /// Closed by the end of the block enclosing the start statement (`using var`).
    EnclosingBlock,
    /// Closed where the start call's argument list closes (active-span callbacks).
    Call,
}

/// Block delimiting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    Braces,
    Indentation,
}

/// Entry-point family recognized from a function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Http,
    Rpc,
    Consumer,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rpc => "rpc",
            Self::Consumer => "consumer",
        }
    }
}

/// One call shape.
///
/// `pattern` must end right where the argument list of the call begins. The
/// optional named group `handle` captures the span variable, and the named
/// group `deferred` marks a span end that runs when the enclosing function
/// returns. When `name_arg` is set, the extractor skips that many leading
/// arguments and reads the next one as the construct's name expression.
#[derive(Debug, Clone, Copy)]
pub struct CallShape {
    pub kind: ConstructKind,
    pub pattern: &'static str,
    pub name_arg: Option<usize>,
    pub scope: ScopeStyle,
}

impl CallShape {
    pub const fn named(kind: ConstructKind, pattern: &'static str, skip: usize) -> Self {
        Self {
            kind,
            pattern,
            name_arg: Some(skip),
            scope: ScopeStyle::Explicit,
        }
    }

    pub const fn bare(kind: ConstructKind, pattern: &'static str) -> Self {
        Self {
            kind,
            pattern,
            name_arg: None,
            scope: ScopeStyle::Explicit,
        }
    }

    pub const fn scoped(pattern: &'static str, skip: usize, scope: ScopeStyle) -> Self {
        Self {
            kind: ConstructKind::SpanStart,
            pattern,
            name_arg: Some(skip),
            scope,
        }
    }
}

/// Signature shape of an entry point.
#[derive(Debug, Clone, Copy)]
pub struct EntryShape {
    pub kind: EntryKind,
    pub pattern: &'static str,
}

/// Comment syntax.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static [&'static str],
    pub block: Option<(&'static str, &'static str)>,
}

/// Declarative lexical profile for one language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    pub language: Language,
    pub comments: CommentSyntax,
    /// String delimiters, longest first. Multi-character delimiters and
    /// backticks may span lines.
    pub strings: &'static [&'static str],
    pub block_style: BlockStyle,
    pub call_shapes: &'static [CallShape],
    /// Function header patterns; named groups `name` (optional) and `params`.
    pub functions: &'static [&'static str],
    pub loops: &'static [&'static str],
    /// Words that never name a function even when followed by `(`.
    pub control_keywords: &'static [&'static str],
    pub entry_shapes: &'static [EntryShape],
    pub entry_functions: &'static [&'static str],
    /// Patterns showing an error leaves the function; `{err}` is replaced by
    /// the recorded error expression.
    pub error_propagation: &'static [&'static str],
    /// Statements that leave the enclosing function.
    pub exits: &'static [&'static str],
    /// Constructs that run their body on every exit (`finally`).
    pub exit_guards: &'static [&'static str],
}

/// A call shape with its regex compiled.
#[derive(Debug)]
pub struct CompiledShape {
    pub kind: ConstructKind,
    pub regex: Regex,
    pub name_arg: Option<usize>,
    pub scope: ScopeStyle,
}

/// A profile with every pattern compiled.
#[derive(Debug)]
pub struct CompiledProfile {
    pub profile: &'static LanguageProfile,
    pub shapes: Vec<CompiledShape>,
    functions: Vec<Regex>,
    loops: Vec<Regex>,
    entries: Vec<(EntryKind, Regex)>,
    exits: Vec<Regex>,
    exit_guards: Vec<Regex>,
}

fn compile(language: Language, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(language = %language, pattern, error = %e, "Skipping invalid profile pattern");
            None
        }
    }
}

impl CompiledProfile {
    pub fn compile(profile: &'static LanguageProfile) -> Self {
        let lang = profile.language;
        let shapes = profile
            .call_shapes
            .iter()
            .filter_map(|shape| {
                compile(lang, shape.pattern).map(|regex| CompiledShape {
                    kind: shape.kind,
                    regex,
                    name_arg: shape.name_arg,
                    scope: shape.scope,
                })
            })
            .collect();

        Self {
            profile,
            shapes,
            functions: profile.functions.iter().filter_map(|p| compile(lang, p)).collect(),
            loops: profile.loops.iter().filter_map(|p| compile(lang, p)).collect(),
            entries: profile
                .entry_shapes
                .iter()
                .filter_map(|e| compile(lang, e.pattern).map(|re| (e.kind, re)))
                .collect(),
            exits: profile.exits.iter().filter_map(|p| compile(lang, p)).collect(),
            exit_guards: profile.exit_guards.iter().filter_map(|p| compile(lang, p)).collect(),
        }
    }

    pub fn language(&self) -> Language {
        self.profile.language
    }

    /// Whether a block header statement opens a loop.
    pub fn is_loop_header(&self, statement: &str) -> bool {
        self.loops.iter().any(|re| re.is_match(statement))
    }

    /// Parse a block header statement as a function declaration.
    ///
    /// Returns the function name (absent for anonymous functions) and the
    /// parameter text.
    pub fn function_header(&self, statement: &str) -> Option<(Option<String>, String)> {
        for re in &self.functions {
            let Some(caps) = re.captures(statement) else {
                continue;
            };
            let name = caps
                .name("name")
                .map(|m| m.as_str().to_string())
                .filter(|n| !n.is_empty());
            if let Some(ref n) = name {
                if self.profile.control_keywords.contains(&n.as_str()) {
                    continue;
                }
                if statement.contains(&format!("new {n}")) {
                    continue;
                }
            }
            let params = caps
                .name("params")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            return Some((name, params));
        }
        None
    }

    /// Match a function signature (with decorators/annotations) against the
    /// entry-point shapes.
    pub fn entry_kind(&self, signature: &str) -> Option<EntryKind> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(signature))
            .map(|(kind, _)| *kind)
    }

    pub fn is_entry_function(&self, name: &str) -> bool {
        self.profile.entry_functions.contains(&name)
    }

    /// Whether `region` propagates the error expression `err` to the caller.
    pub fn propagates_error(&self, region: &str, err: &str) -> bool {
        let err = err.trim();
        let simple = !err.is_empty() && err.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        self.profile.error_propagation.iter().any(|template| {
            if template.contains("{err}") && !simple {
                return false;
            }
            let pattern = template.replace("{err}", &regex::escape(err));
            Regex::new(&pattern)
                .map(|re| re.is_match(region))
                .unwrap_or(false)
        })
    }

    /// Offsets of exit statements in `region`, in order.
    pub fn exits_in(&self, region: &str) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .exits
            .iter()
            .flat_map(|re| re.find_iter(region).map(|m| m.start()))
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Offset of the first exit guard in `region`.
    pub fn exit_guard_in(&self, region: &str) -> Option<usize> {
        self.exit_guards
            .iter()
            .filter_map(|re| re.find(region).map(|m| m.start()))
            .min()
    }
}

/// Registry of compiled profiles, built once per process.
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: HashMap<Language, CompiledProfile>,
}

static REGISTRY: Lazy<ProfileRegistry> = Lazy::new(ProfileRegistry::builtin);

impl ProfileRegistry {
    fn builtin() -> Self {
        let profiles = Language::ALL
            .iter()
            .map(|lang| (*lang, CompiledProfile::compile(tables::profile_for(*lang))))
            .collect();
        Self { profiles }
    }

    /// The shared registry of built-in profiles.
    pub fn global() -> &'static Self {
        &REGISTRY
    }

    pub fn get(&self, language: Language) -> Option<&CompiledProfile> {
        self.profiles.get(&language)
    }
}
