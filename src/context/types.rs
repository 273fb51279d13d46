// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span scopes and per-file structural context.

use serde::{Deserialize, Serialize};

use crate::extract::{BlockId, ConstructId, Extraction};
use crate::lang::{ConstructKind, EntryKind};

pub type ScopeId = usize;

/// Where a span sits relative to application entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Boundary,
    Internal,
    Unknown,
}

impl BoundaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boundary => "boundary",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Boundary classification plus the independent loop tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub boundary: BoundaryKind,
    pub entry: Option<EntryKind>,
    pub loop_body: bool,
}

impl Classification {
    /// Short label such as `internal` or `boundary+loop`.
    pub fn label(&self) -> String {
        if self.loop_body {
            format!("{}+loop", self.boundary)
        } else {
            self.boundary.to_string()
        }
    }
}

/// How a scope was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A matching span-end call.
    Explicit,
    /// A deferred span-end that runs at function return.
    Deferred,
    /// The end of the block or call that owns the span.
    BlockEnd,
    /// Never closed.
    Unterminated,
    /// Ended explicitly, but an exit statement before the end skips it.
    EarlyExit,
}

/// Coarse domain of the code around a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextHint {
    Http,
    Database,
    Messaging,
    General,
}

impl ContextHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Database => "database",
            Self::Messaging => "messaging",
            Self::General => "general",
        }
    }
}

/// Facts about a function that encloses at least one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionFacts {
    pub block: BlockId,
    pub name: Option<String>,
    /// Header with decorators/annotations.
    pub signature: String,
    pub entry: Option<EntryKind>,
    /// Named as an entry function by the profile or configuration.
    pub designated: bool,
}

/// A span start, its matched end, and everything attached between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanScope {
    pub id: ScopeId,
    pub start: ConstructId,
    pub end: Option<ConstructId>,
    /// Offset where the scope stopped accepting constructs.
    pub close_offset: usize,
    /// Open scopes around the start; 0 for an outermost scope.
    pub depth: usize,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Constructs attached directly to this scope, in source order.
    pub constructs: Vec<ConstructId>,
    pub function: Option<BlockId>,
    pub classification: Classification,
    pub termination: Termination,
    /// Offset of the exit statement that skips the end.
    pub early_exit: Option<usize>,
    /// An error recorded here also leaves the function.
    pub propagates_error: bool,
    /// Scopes in calling functions that record the same error again.
    pub error_callers: Vec<ScopeId>,
    pub hint: ContextHint,
}

impl SpanScope {
    pub fn is_unterminated(&self) -> bool {
        matches!(
            self.termination,
            Termination::Unterminated | Termination::EarlyExit
        )
    }
}

/// Structural context of one file.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    pub scopes: Vec<SpanScope>,
    /// Span ends with nothing open and telemetry calls outside every scope.
    pub unmatched: Vec<ConstructId>,
    pub instruments: Vec<ConstructId>,
    /// Owning scope per construct, indexed by construct id.
    pub attachment: Vec<Option<ScopeId>>,
    /// Stack depth per construct, indexed by construct id.
    pub depths: Vec<usize>,
    pub functions: Vec<FunctionFacts>,
}

impl FileContext {
    pub fn scope(&self, id: ScopeId) -> Option<&SpanScope> {
        self.scopes.get(id)
    }

    pub fn scope_of(&self, construct: ConstructId) -> Option<ScopeId> {
        self.attachment.get(construct).copied().flatten()
    }

    pub fn function(&self, block: BlockId) -> Option<&FunctionFacts> {
        self.functions.iter().find(|f| f.block == block)
    }

    /// Directly attached constructs of one kind.
    pub fn attached<'a>(
        &'a self,
        extraction: &'a Extraction,
        scope: ScopeId,
        kind: ConstructKind,
    ) -> impl Iterator<Item = &'a crate::extract::Construct> + 'a {
        self.scopes
            .get(scope)
            .into_iter()
            .flat_map(|s| s.constructs.iter())
            .filter_map(|&id| extraction.constructs.get(id))
            .filter(move |c| c.kind == kind)
    }

    pub fn records_error(&self, extraction: &Extraction, scope: ScopeId) -> bool {
        self.attached(extraction, scope, ConstructKind::ErrorRecord)
            .next()
            .is_some()
    }
}
