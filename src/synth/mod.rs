// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Violation synthesis.
//!
//! For each span scope, orphan construct, and metric instrument, the
//! synthesizer lists candidate issues, asks the retrieval oracle for rule
//! passages, and asks the judgment oracle whether the rule is violated.
//! Structural issues (unterminated spans, orphans, unmatched ends) skip
//! the judge.
//!
//! Oracle calls run concurrently up to [`OraclePolicy::max_concurrency`],
//! each under a timeout with bounded retries. A call that still fails
//! becomes a `judgment-unavailable` placeholder finding; it never stops
//! the rest of the file.

mod candidates;
mod policy;
mod query;
mod synthesizer;

pub use candidates::{
    canonical_key, collect_candidates, is_sensitive_key, scope_candidates, Candidate,
};
pub use policy::{CallRecord, CancellationFlag, OraclePolicy, SynthesisStats};
pub use query::formulate_query;
pub use synthesizer::{Synthesis, Synthesizer};
