// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Report rendering for the terminal.

use std::fmt::Write as _;

use clap::ValueEnum;
use colored::{ColoredString, Colorize};

use crate::rag::{CorpusStats, RulePassage};
use crate::report::{Finding, RunReport, Severity};

/// How a run report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Findings grouped by file
    #[default]
    Text,
    /// The full report as JSON
    Json,
    /// Totals only
    Summary,
    /// Markdown document for pull requests and wikis
    Markdown,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Summary => write!(f, "summary"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Render `report` in `format`.
pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Summary => Ok(render_summary(report)),
        OutputFormat::Markdown => Ok(render_markdown(report)),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{:<6}", severity.as_str().to_uppercase());
    match severity {
        Severity::High => label.red().bold(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.blue(),
    }
}

fn render_finding(out: &mut String, finding: &Finding) {
    let position = format!("{}:{}", finding.location.line, finding.location.column);
    let header = format!(
        "  {:>7} {} [{}] {} ({:.2})",
        position,
        severity_label(finding.severity),
        finding.category_label(),
        finding.message,
        finding.confidence
    );
    if finding.is_placeholder() {
        let _ = writeln!(out, "{}", header.dimmed());
    } else {
        let _ = writeln!(out, "{}", header);
    }

    if let Some(function) = &finding.function {
        let _ = writeln!(out, "          {} {}", "in".dimmed(), function);
    }
    for fix in &finding.fixes {
        let _ = writeln!(out, "          {} {}", "fix:".green(), fix);
    }
    for related in &finding.related {
        let _ = writeln!(
            out,
            "          {} {}:{} {}",
            "see".dimmed(),
            related.location.line,
            related.location.column,
            related.note
        );
    }
    if !finding.rule_refs.is_empty() {
        let _ = writeln!(
            out,
            "          {} {}",
            "rules:".dimmed(),
            finding.rule_refs.join(", ")
        );
    }
}

/// Findings grouped by file, followed by the summary.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    for file in &report.files {
        if file.findings.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} {}", file.path.bold(), format!("({})", file.language).dimmed());
        for finding in &file.findings {
            render_finding(&mut out, finding);
        }
        let _ = writeln!(out);
    }

    out.push_str(&render_summary(report));
    out
}

/// Totals by severity and category, oracle activity, and skipped files.
pub fn render_summary(report: &RunReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    let headline = summary.headline();
    let headline = if summary.count(Severity::High) > 0 {
        headline.red().bold()
    } else if summary.findings > 0 {
        headline.yellow().bold()
    } else {
        headline.green().bold()
    };
    let _ = writeln!(out, "{}", headline);

    if !summary.by_category.is_empty() {
        let _ = writeln!(out, "{}", "By category:".bold());
        for (category, count) in &summary.by_category {
            let _ = writeln!(out, "  {:<28} {}", category.as_str(), count);
        }
    }

    let stats = &summary.stats;
    let _ = writeln!(
        out,
        "Oracle calls: {} ({} failed, {} retries, {} timeouts)",
        stats.calls, stats.failures, stats.retries, stats.timeouts
    );
    if summary.placeholders > 0 {
        let _ = writeln!(
            out,
            "{}",
            format!("{} candidate(s) could not be judged", summary.placeholders).yellow()
        );
    }
    if summary.skipped_sites > 0 {
        let _ = writeln!(out, "Unreadable call sites: {}", summary.skipped_sites);
    }
    for skipped in &report.skipped {
        let _ = writeln!(out, "{} {} ({})", "skipped".dimmed(), skipped.path, skipped.reason);
    }
    if report.cancelled {
        let _ = writeln!(
            out,
            "{}",
            format!("Cancelled: {} candidate(s) not evaluated", stats.cancelled).yellow()
        );
    }
    out
}

/// Escape a value placed in a markdown table cell or heading.
fn md_inline(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// The report as a markdown document: totals, then findings file by file.
pub fn render_markdown(report: &RunReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "# tracelint report\n");
    let _ = writeln!(out, "**{}**\n", summary.headline());
    let _ = writeln!(out, "| Severity | Findings |");
    let _ = writeln!(out, "|---|---|");
    for severity in Severity::ALL {
        let _ = writeln!(out, "| {} | {} |", severity.as_str(), summary.count(severity));
    }
    if !summary.by_category.is_empty() {
        let _ = writeln!(out, "\n| Category | Findings |");
        let _ = writeln!(out, "|---|---|");
        for (category, count) in &summary.by_category {
            let _ = writeln!(out, "| `{}` | {} |", category.as_str(), count);
        }
    }

    if summary.findings == 0 {
        let _ = writeln!(out, "\nNo findings.");
    }
    for file in report.files.iter().filter(|f| !f.findings.is_empty()) {
        let _ = writeln!(out, "\n## {}\n", md_inline(&file.path));
        for (i, finding) in file.findings.iter().enumerate() {
            let _ = writeln!(
                out,
                "### {}. {}: {}\n",
                i + 1,
                finding.severity.as_str().to_uppercase(),
                md_inline(&finding.message)
            );
            let _ = writeln!(
                out,
                "- **Location:** `{}:{}:{}`",
                file.path, finding.location.line, finding.location.column
            );
            let _ = writeln!(out, "- **Category:** `{}`", finding.category_label());
            let _ = writeln!(out, "- **Confidence:** {:.0}%", finding.confidence * 100.0);
            if let Some(function) = &finding.function {
                let _ = writeln!(out, "- **Function:** `{}`", function);
            }
            for fix in &finding.fixes {
                let _ = writeln!(out, "- **Fix:** {}", md_inline(fix));
            }
            for related in &finding.related {
                let _ = writeln!(
                    out,
                    "- **See:** line {}: {}",
                    related.location.line,
                    md_inline(&related.note)
                );
            }
            if !finding.rule_refs.is_empty() {
                let refs: Vec<String> = finding.rule_refs.iter().map(|r| format!("`{r}`")).collect();
                let _ = writeln!(out, "- **Rules:** {}", refs.join(", "));
            }
            if !finding.snippet.is_empty() {
                let _ = writeln!(out, "\n```{}\n{}\n```", file.language, finding.snippet.trim_end());
            }
            let _ = writeln!(out);
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "\n## Skipped\n");
        for skipped in &report.skipped {
            let _ = writeln!(out, "- `{}`: {}", skipped.path, skipped.reason);
        }
    }
    if report.cancelled {
        let _ = writeln!(
            out,
            "\n_Cancelled: {} candidate(s) not evaluated._",
            summary.stats.cancelled
        );
    }
    out
}

/// Passages returned by `tracelint ask`.
pub fn render_passages(passages: &[RulePassage]) -> String {
    if passages.is_empty() {
        return format!("{}\n", "No matching rules.".dimmed());
    }
    let mut out = String::new();
    for (i, passage) in passages.iter().enumerate() {
        let title = passage.section.as_deref().unwrap_or(&passage.source);
        let _ = writeln!(
            out,
            "{} {} {}",
            format!("{}.", i + 1).bold(),
            title.cyan(),
            format!("[{}] score {:.3}", passage.id, passage.score).dimmed()
        );
        for line in passage.text.lines() {
            let _ = writeln!(out, "   {}", line);
        }
        let _ = writeln!(out);
    }
    out
}

/// Corpus statistics printed by `tracelint kb`.
pub fn render_corpus_stats(stats: &CorpusStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} passages from {} file(s)",
        "Knowledge base:".bold(),
        stats.passages,
        stats.files
    );
    for (kind, count) in &stats.by_kind {
        let _ = writeln!(out, "  {:<14} {}", kind.as_str(), count);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FileReport, Location, RuleCategory, SkippedFile};
    use crate::synth::SynthesisStats;
    use chrono::Utc;

    fn report() -> RunReport {
        colored::control::set_override(false);
        let finding = Finding::new(
            "svc/user.go",
            "go",
            Location {
                line: 4,
                column: 2,
                offset: 60,
            },
            RuleCategory::NamingConvention,
            "Span name \"loadUser\" is camelCase",
        )
        .with_confidence(0.8)
        .with_fix("Rename the span to \"load user\"")
        .with_rule_ref("3f2a9c");
        let placeholder = Finding::new(
            "svc/user.go",
            "go",
            Location {
                line: 9,
                column: 2,
                offset: 140,
            },
            RuleCategory::JudgmentUnavailable,
            "Could not evaluate loop-body: timed out",
        );
        let file = FileReport::new(
            "svc/user.go",
            "go",
            vec![finding, placeholder],
            0,
            SynthesisStats {
                candidates: 2,
                calls: 4,
                failures: 1,
                retries: 2,
                timeouts: 1,
                ..Default::default()
            },
        );
        RunReport::new(
            vec![file],
            vec![SkippedFile {
                path: "svc/notes.txt".to_string(),
                reason: "unsupported language".to_string(),
            }],
            Utc::now(),
            false,
        )
    }

    #[test]
    fn test_render_text() {
        let text = render_report(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("svc/user.go (go)"));
        assert!(text.contains("4:2 MEDIUM [naming-convention] Span name \"loadUser\" is camelCase (0.80)"));
        assert!(text.contains("fix: Rename the span to \"load user\""));
        assert!(text.contains("rules: 3f2a9c"));
        assert!(text.contains("[judgment-unavailable]"));
        assert!(text.contains("2 findings (1 medium, 1 low) in 1 file"));
    }

    #[test]
    fn test_render_summary() {
        let text = render_report(&report(), OutputFormat::Summary).unwrap();
        assert!(!text.contains("svc/user.go (go)"));
        assert!(text.contains("Oracle calls: 4 (1 failed, 2 retries, 1 timeouts)"));
        assert!(text.contains("1 candidate(s) could not be judged"));
        assert!(text.contains("skipped svc/notes.txt (unsupported language)"));
    }

    #[test]
    fn test_render_json() {
        let json = render_report(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["findings"], 2);
        assert_eq!(value["files"][0]["findings"][0]["rule_refs"][0], "3f2a9c");
    }

    #[test]
    fn test_render_markdown() {
        let md = render_report(&report(), OutputFormat::Markdown).unwrap();
        assert!(md.starts_with("# tracelint report\n"));
        assert!(md.contains("**2 findings (1 medium, 1 low) in 1 file**"));
        assert!(md.contains("| medium | 1 |"));
        assert!(md.contains("| high | 0 |"));
        assert!(md.contains("| `naming-convention` | 1 |"));
        assert!(md.contains("## svc/user.go"));
        assert!(md.contains("### 1. MEDIUM: Span name \"loadUser\" is camelCase"));
        assert!(md.contains("- **Location:** `svc/user.go:4:2`"));
        assert!(md.contains("- **Confidence:** 80%"));
        assert!(md.contains("- **Fix:** Rename the span to \"load user\""));
        assert!(md.contains("- **Rules:** `3f2a9c`"));
        assert!(md.contains("- `svc/notes.txt`: unsupported language"));
        assert!(!md.contains('\u{1b}'));
    }

    #[test]
    fn test_markdown_escapes_table_pipes() {
        assert_eq!(md_inline("a | b\nc"), "a \\| b c");
    }

    #[test]
    fn test_render_passages_empty() {
        colored::control::set_override(false);
        assert_eq!(render_passages(&[]), "No matching rules.\n");
    }
}
