// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Types produced by construct extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::lexer::Regions;
use super::outline::{BlockId, Outline};
use crate::lang::{ConstructKind, ScopeStyle};

/// Index of a construct in its file's extracted sequence.
pub type ConstructId = usize;

/// Span kind named at a span start site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKindHint {
    Server,
    Client,
    Producer,
    Consumer,
    Internal,
}

impl SpanKindHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
            Self::Internal => "internal",
        }
    }

    /// Kinds that claim the span handles inbound work.
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::Server | Self::Consumer)
    }

    pub(crate) fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "server" => Some(Self::Server),
            "client" => Some(Self::Client),
            "producer" => Some(Self::Producer),
            "consumer" => Some(Self::Consumer),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpanKindHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static INTERPOLATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$?\{[^{}]*\}").unwrap());
static FORMAT_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bSprintf|\bString\.format|\.format|\bformat)\s*\(|%\s*[\w(]").unwrap()
});

/// The verbatim name argument of a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameExpr {
    /// Argument text as written.
    pub raw: String,
    /// Value of a plain string literal.
    pub literal: Option<String>,
    /// Interpolated literal with each interpolation replaced by `{}`.
    pub template: Option<String>,
    /// Whether the value is only known at runtime.
    pub dynamic: bool,
}

struct Literal<'a> {
    prefix: &'a str,
    delim: &'static str,
    body: &'a str,
}

fn parse_literal(raw: &str) -> Option<Literal<'_>> {
    let prefix_len = raw.find(['"', '\'', '`'])?;
    let prefix = &raw[..prefix_len];
    if prefix.len() > 2
        || !prefix
            .chars()
            .all(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U' | 'f' | 'F' | '@' | '$'))
    {
        return None;
    }
    let rest = &raw[prefix_len..];
    let delim = ["\"\"\"", "'''", "\"", "'", "`"]
        .into_iter()
        .find(|d| rest.starts_with(d))?;
    if rest.len() < delim.len() * 2 || !rest.ends_with(delim) {
        return None;
    }
    let body = &rest[delim.len()..rest.len() - delim.len()];
    if has_unescaped(body, delim) {
        return None;
    }
    Some(Literal {
        prefix,
        delim,
        body,
    })
}

fn has_unescaped(body: &str, delim: &str) -> bool {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(delim.as_bytes()) {
            return true;
        }
        i += 1;
    }
    false
}

impl NameExpr {
    pub fn analyze(raw: &str) -> Self {
        let raw = raw.trim();
        let Some(lit) = parse_literal(raw) else {
            return Self {
                raw: raw.to_string(),
                literal: None,
                template: None,
                dynamic: true,
            };
        };

        let interpolated = lit.prefix.contains(['f', 'F', '$'])
            || (lit.delim == "`" && lit.body.contains("${"));
        if interpolated {
            return Self {
                raw: raw.to_string(),
                literal: None,
                template: Some(INTERPOLATION.replace_all(lit.body, "{}").into_owned()),
                dynamic: true,
            };
        }

        Self {
            raw: raw.to_string(),
            literal: Some(lit.body.to_string()),
            template: None,
            dynamic: false,
        }
    }

    /// The name when it is fully known from the source text.
    pub fn static_name(&self) -> Option<&str> {
        if self.dynamic {
            None
        } else {
            self.literal.as_deref()
        }
    }

    /// Best readable form: the literal, the template, or the raw text.
    pub fn display(&self) -> &str {
        self.literal
            .as_deref()
            .or(self.template.as_deref())
            .unwrap_or(&self.raw)
    }

    /// Whether the expression builds its value with a formatting call or
    /// concatenation rather than naming a variable.
    pub fn is_formatted(&self) -> bool {
        self.template.is_some() || FORMAT_CALL.is_match(&self.raw) || self.raw.contains('+')
    }
}

/// One telemetry call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Construct {
    pub index: ConstructId,
    pub kind: ConstructKind,
    pub name: Option<NameExpr>,
    /// Span variable bound or ended at this site.
    pub handle: Option<String>,
    /// Object the call is made on.
    pub receiver: Option<String>,
    pub scope_style: ScopeStyle,
    /// A span end that runs when the enclosing function returns.
    pub deferred: bool,
    pub span_kind: Option<SpanKindHint>,
    /// Byte offset where the matched call shape starts.
    pub offset: usize,
    /// Byte offset just past the name argument, or past the matched shape.
    pub end: usize,
    /// Offset of the `)` closing the call, when it could be found.
    pub call_end: Option<usize>,
    pub line: usize,
    pub column: usize,
    /// Innermost enclosing block.
    pub block: Option<BlockId>,
}

impl Construct {
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_ref().map(NameExpr::display)
    }

    pub fn is_dynamic(&self) -> bool {
        self.name.as_ref().is_some_and(|n| n.dynamic)
    }
}

/// A call site that matched a shape but could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSite {
    pub kind: ConstructKind,
    pub offset: usize,
    pub line: usize,
    pub reason: String,
}

/// Result of extracting one file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Constructs in source order; `constructs[i].index == i`.
    pub constructs: Vec<Construct>,
    pub outline: Outline,
    pub regions: Regions,
    pub skipped: Vec<SkippedSite>,
}

impl Extraction {
    pub fn of_kind(&self, kind: ConstructKind) -> impl Iterator<Item = &Construct> + '_ {
        self.constructs.iter().filter(move |c| c.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_literals_are_static() {
        let n = NameExpr::analyze(r#""process order""#);
        assert_eq!(n.static_name(), Some("process order"));
        assert!(!n.dynamic);

        let n = NameExpr::analyze("'GET /users'");
        assert_eq!(n.static_name(), Some("GET /users"));

        let n = NameExpr::analyze("`load config`");
        assert_eq!(n.static_name(), Some("load config"));

        let n = NameExpr::analyze(r#"@"db.query""#);
        assert_eq!(n.static_name(), Some("db.query"));
    }

    #[test]
    fn test_interpolation_is_dynamic_with_template() {
        let n = NameExpr::analyze(r#"f"GET /users/{user_id}""#);
        assert!(n.dynamic);
        assert_eq!(n.template.as_deref(), Some("GET /users/{}"));
        assert_eq!(n.static_name(), None);

        let n = NameExpr::analyze("`fetch ${id}`");
        assert!(n.dynamic);
        assert_eq!(n.template.as_deref(), Some("fetch {}"));

        let n = NameExpr::analyze(r#"$"order {order.Id}""#);
        assert!(n.dynamic);
        assert_eq!(n.display(), "order {}");
    }

    #[test]
    fn test_runtime_built_names_are_dynamic() {
        for raw in [
            r#""user." + id"#,
            r#"fmt.Sprintf("GET /users/%s", id)"#,
            r#""process {}".format(name)"#,
            r#""a" + "b""#,
            "spanName",
            "SpanNames.GET_USER",
        ] {
            let n = NameExpr::analyze(raw);
            assert!(n.dynamic, "{raw}");
            assert_eq!(n.literal, None, "{raw}");
        }
        assert!(NameExpr::analyze(r#""user." + id"#).is_formatted());
        assert!(!NameExpr::analyze("spanName").is_formatted());
    }

    #[test]
    fn test_escaped_quote_stays_literal() {
        let n = NameExpr::analyze(r#""say \"hi\"""#);
        assert!(!n.dynamic);
    }

    #[test]
    fn test_span_kind_parse() {
        assert_eq!(SpanKindHint::parse("SERVER"), Some(SpanKindHint::Server));
        assert_eq!(SpanKindHint::parse("Consumer"), Some(SpanKindHint::Consumer));
        assert_eq!(SpanKindHint::parse("other"), None);
        assert!(SpanKindHint::Server.is_inbound());
        assert!(!SpanKindHint::Client.is_inbound());
    }
}
