// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structural context around extracted constructs.
//!
//! Span starts and ends are paired over a stack of open scopes. Scopes that
//! close with a block (`with`, `using`, decorators, active-span callbacks)
//! leave the stack when the block ends; explicit spans left open at the end
//! of their enclosing function are reported as unterminated rather than
//! swallowing the rest of the file.

mod builder;
mod hint;
mod types;

pub use builder::build_context;
pub use hint::context_hint;
pub use types::{
    BoundaryKind, Classification, ContextHint, FileContext, FunctionFacts, ScopeId, SpanScope,
    Termination,
};
