// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pattern-based construct extraction.
//!
//! Extraction works on raw text and never needs the file to compile:
//!
//! - **Lexer**: masks comments and string literals, scans balanced arguments
//! - **Outline**: recovers function, loop and other blocks
//! - **Extractor**: matches profile call shapes and reads their name arguments
//!
//! A call site that cannot be read is skipped and recorded; it never aborts
//! the rest of the file.

mod extractor;
pub mod lexer;
pub mod outline;
mod source;
mod types;

pub use extractor::extract;
pub use lexer::{Region, RegionKind, Regions};
pub use outline::{Block, BlockId, BlockKind, Outline};
pub use source::SourceUnit;
pub use types::{
    Construct, ConstructId, Extraction, NameExpr, SkippedSite, SpanKindHint,
};
