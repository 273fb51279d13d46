// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Judge backed by a chat completion provider.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::OracleError;
use crate::providers::{BoxedProvider, CompletionRequest};
use crate::rag::RulePassage;
use crate::report::Severity;

use super::{Judgment, JudgmentContext, JudgmentOracle};

const SYSTEM_PROMPT: &str = "You review OpenTelemetry instrumentation in application code. \
You are given one candidate issue, the instrumentation rules that apply to it, and the code context. \
Decide strictly from the rules whether the code violates them. \
Answer with a single JSON object and nothing else.";

const ANSWER_SHAPE: &str = r#"{
  "violated": true or false,
  "message": "one sentence naming the problem, empty when not violated",
  "fix": "concrete change to make, empty when not violated",
  "severity": "low" | "medium" | "high",
  "confidence": number between 0 and 1,
  "passage_id": "id of the rule you relied on, or null"
}"#;

/// Rule text longer than this is cut in the prompt.
const MAX_PASSAGE_CHARS: usize = 1200;

/// Judge that asks an LLM.
pub struct LlmJudge {
    provider: BoxedProvider,
    name: String,
}

impl LlmJudge {
    pub fn new(provider: BoxedProvider) -> Self {
        let name = format!("llm:{}", provider.name().to_lowercase());
        Self { provider, name }
    }

    /// Render the user prompt.
    pub fn render_prompt(
        context: &JudgmentContext,
        passages: &[RulePassage],
    ) -> Result<String, OracleError> {
        let context_json = serde_json::to_string_pretty(context)
            .map_err(|e| OracleError::Malformed(format!("context serialization: {}", e)))?;

        let mut prompt = String::new();
        prompt.push_str("## Candidate issue\n\n");
        prompt.push_str(&format!(
            "{}: {}\n\n",
            context.category,
            context.category.describe()
        ));

        prompt.push_str("## Rules\n\n");
        if passages.is_empty() {
            prompt.push_str("(no matching rules; judge from general OpenTelemetry conventions)\n\n");
        }
        for passage in passages {
            let text: String = passage.text.chars().take(MAX_PASSAGE_CHARS).collect();
            prompt.push_str(&format!(
                "[{}] {}\n{}\n\n",
                passage.id,
                passage.section.as_deref().unwrap_or(""),
                text.trim()
            ));
        }

        prompt.push_str("## Context\n\n```json\n");
        prompt.push_str(&context_json);
        prompt.push_str("\n```\n\n## Answer\n\nRespond with JSON in exactly this shape:\n\n");
        prompt.push_str(ANSWER_SHAPE);
        prompt.push('\n');
        Ok(prompt)
    }
}

#[async_trait]
impl JudgmentOracle for LlmJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn judge(
        &self,
        context: &JudgmentContext,
        passages: &[RulePassage],
    ) -> Result<Judgment, OracleError> {
        let start = Instant::now();
        let request = CompletionRequest::new(SYSTEM_PROMPT, Self::render_prompt(context, passages)?);
        let completion = self.provider.complete(&request).await?;

        debug!(
            judge = %self.name,
            category = %context.category,
            line = context.line,
            output_tokens = completion.output_tokens,
            "Judge answered"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_tokens(
                completion.input_tokens as u64,
                completion.output_tokens as u64,
            );
            GLOBAL_METRICS.record_operation("judge.llm", start.elapsed());
        }
        #[cfg(not(feature = "telemetry"))]
        let _ = start;

        let mut judgment = parse_judgment(&completion.text, context.category.default_severity())?;
        if let Some(id) = &judgment.passage_id {
            if !passages.iter().any(|p| &p.id == id) {
                judgment.passage_id = None;
            }
        }
        Ok(judgment)
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    violated: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fix: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default, alias = "passageId", alias = "rule_id")]
    passage_id: Option<String>,
}

/// Parse a model answer into a validated judgment.
///
/// Code fences and prose around the outermost JSON object are ignored. A
/// missing severity takes `default_severity`; a missing confidence is 0.5.
pub fn parse_judgment(text: &str, default_severity: Severity) -> Result<Judgment, OracleError> {
    let body = strip_fences(text);
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(open), Some(close)) if open < close => &body[open..=close],
        _ => {
            return Err(OracleError::Malformed(format!(
                "no JSON object in answer: {}",
                preview(text)
            )))
        }
    };

    let raw: RawJudgment = serde_json::from_str(json)
        .map_err(|e| OracleError::Malformed(format!("{}: {}", e, preview(json))))?;

    let severity = match raw.severity.as_deref().map(str::trim) {
        None | Some("") => default_severity,
        Some(s) => Severity::parse_loose(s)
            .ok_or_else(|| OracleError::Malformed(format!("unknown severity: {}", s)))?,
    };

    Judgment {
        violated: raw.violated,
        message: raw.message.unwrap_or_default().trim().to_string(),
        fix: raw.fix.unwrap_or_default().trim().to_string(),
        severity,
        confidence: raw.confidence.unwrap_or(0.5),
        passage_id: raw.passage_id.filter(|id| !id.trim().is_empty()),
    }
    .validate()
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest).trim()
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(80).collect();
    if short.len() < text.len() {
        format!("{}...", short)
    } else {
        short
    }
}
