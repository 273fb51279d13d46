// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lexical masking and call-argument scanning.
//!
//! There is no tokenizer here. Comments and string literals are located well
//! enough that call shapes inside them are ignored and braces inside them do
//! not disturb the block outline. Everything else is plain text.

use crate::lang::LanguageProfile;

/// Longest name argument we are willing to read.
const MAX_NAME_ARG: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Comment,
    String,
}

/// A masked byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub kind: RegionKind,
}

/// Sorted, non-overlapping comment and string regions of a file.
#[derive(Debug, Clone, Default)]
pub struct Regions {
    regions: Vec<Region>,
}

impl Regions {
    /// Locate comments and string literals. Unterminated single-line strings
    /// stop at the end of their line; unterminated block comments and
    /// multi-line strings run to the end of the file.
    pub fn scan(text: &str, profile: &LanguageProfile) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut regions = Vec::new();
        let mut i = 0;

        while i < len {
            let rest = &bytes[i..];

            if profile.comments.line.iter().any(|p| rest.starts_with(p.as_bytes())) {
                let end = find_byte(bytes, i, b'\n').unwrap_or(len);
                regions.push(Region { start: i, end, kind: RegionKind::Comment });
                i = end;
                continue;
            }

            if let Some((open, close)) = profile.comments.block {
                if rest.starts_with(open.as_bytes()) {
                    let end = find_seq(bytes, i + open.len(), close.as_bytes())
                        .map(|p| p + close.len())
                        .unwrap_or(len);
                    regions.push(Region { start: i, end, kind: RegionKind::Comment });
                    i = end;
                    continue;
                }
            }

            if let Some(delim) = profile.strings.iter().find(|d| rest.starts_with(d.as_bytes())) {
                let end = string_end(bytes, i, delim.as_bytes());
                regions.push(Region { start: i, end, kind: RegionKind::String });
                i = end;
                continue;
            }

            i += 1;
        }

        Self { regions }
    }

    /// The region containing `pos`, if any.
    pub fn containing(&self, pos: usize) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.start <= pos);
        idx.checked_sub(1)
            .map(|i| &self.regions[i])
            .filter(|r| pos < r.end)
    }

    pub fn is_masked(&self, pos: usize) -> bool {
        self.containing(pos).is_some()
    }

    pub fn is_comment(&self, pos: usize) -> bool {
        matches!(self.containing(pos), Some(r) if r.kind == RegionKind::Comment)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&b| b == needle).map(|p| from + p)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn string_end(bytes: &[u8], start: usize, delim: &[u8]) -> usize {
    let len = bytes.len();
    let multiline = delim.len() > 1 || delim == b"`";
    let mut j = start + delim.len();
    while j < len {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if !multiline => return j,
            _ if bytes[j..].starts_with(delim) => return j + delim.len(),
            _ => j += 1,
        }
    }
    len
}

/// One scanned call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    /// Trimmed argument range; `start == end` for an empty argument.
    pub start: usize,
    pub end: usize,
    /// Position of the `,` or `)` that ended the argument.
    pub terminator: usize,
    /// True when the argument list closed after this argument.
    pub closes_call: bool,
}

/// Why an argument could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    Unterminated,
    Unbalanced,
    StatementEnded,
    TooLong,
}

impl ScanError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unterminated => "call never closes",
            Self::Unbalanced => "unbalanced brackets in argument",
            Self::StatementEnded => "statement ended inside call",
            Self::TooLong => "argument too long",
        }
    }
}

/// Read the argument starting at `pos`, honoring nested brackets and masked
/// regions. `limit` bounds how many bytes may be consumed.
pub fn scan_argument(
    text: &str,
    regions: &Regions,
    pos: usize,
    limit: usize,
) -> Result<Argument, ScanError> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut depth = 0usize;
    let mut i = pos;

    while i < len {
        if i - pos > limit {
            return Err(ScanError::TooLong);
        }
        if let Some(region) = regions.containing(i) {
            i = region.end.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' if depth > 0 => depth -= 1,
            b')' => return Ok(trimmed(text, pos, i, true)),
            b']' | b'}' => return Err(ScanError::Unbalanced),
            b',' if depth == 0 => return Ok(trimmed(text, pos, i, false)),
            b';' if depth == 0 => return Err(ScanError::StatementEnded),
            _ => {}
        }
        i += 1;
    }
    Err(ScanError::Unterminated)
}

/// Read a name argument with the default length limit.
pub fn scan_name_argument(text: &str, regions: &Regions, pos: usize) -> Result<Argument, ScanError> {
    scan_argument(text, regions, pos, MAX_NAME_ARG)
}

/// Offset of the `)` closing the call whose next argument starts at `pos`.
pub fn call_close(text: &str, regions: &Regions, mut pos: usize) -> Option<usize> {
    loop {
        let arg = scan_argument(text, regions, pos, text.len()).ok()?;
        if arg.closes_call {
            return Some(arg.terminator);
        }
        pos = arg.terminator + 1;
    }
}

fn trimmed(text: &str, from: usize, to: usize, closes_call: bool) -> Argument {
    let slice = &text[from..to];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    let start = from + lead;
    let end = (to - trail).max(start);
    Argument {
        start,
        end,
        terminator: to,
        closes_call,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{tables, Language};

    fn regions(lang: Language, text: &str) -> Regions {
        Regions::scan(text, tables::profile_for(lang))
    }

    #[test]
    fn test_go_comments_and_strings() {
        let text = "x := \"a // b\" // tail\n/* block\n */ y := `raw\n{`";
        let r = regions(Language::Go, text);
        assert_eq!(r.len(), 4);
        assert!(r.is_masked(6));
        assert!(r.is_comment(text.find("// tail").unwrap()));
        assert!(r.is_comment(text.find("block").unwrap()));
        assert!(r.is_masked(text.find("{`").unwrap()));
        assert!(!r.is_masked(text.find("y :=").unwrap()));
    }

    #[test]
    fn test_python_triple_quotes_span_lines() {
        let text = "def f():\n    \"\"\"doc with 'quote'\n    more\"\"\"\n    x = 1 # c\n";
        let r = regions(Language::Python, text);
        assert!(r.is_masked(text.find("more").unwrap()));
        assert!(!r.is_masked(text.find("x = 1").unwrap()));
        assert!(r.is_comment(text.find("# c").unwrap()));
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let text = "a(\"oops\nb()";
        let r = regions(Language::JavaScript, text);
        assert!(!r.is_masked(text.find("b()").unwrap()));
    }

    #[test]
    fn test_scan_argument_nested() {
        let text = r#"Start(ctx, fmt.Sprintf("GET /users/%s", id), opts)"#;
        let r = regions(Language::Go, text);
        let first = scan_name_argument(text, &r, 6).unwrap();
        assert_eq!(&text[first.start..first.end], "ctx");
        assert!(!first.closes_call);

        let second = scan_name_argument(text, &r, first.terminator + 1).unwrap();
        assert_eq!(&text[second.start..second.end], r#"fmt.Sprintf("GET /users/%s", id)"#);

        let third = scan_name_argument(text, &r, second.terminator + 1).unwrap();
        assert_eq!(&text[third.start..third.end], "opts");
        assert!(third.closes_call);
    }

    #[test]
    fn test_scan_argument_string_with_delimiters() {
        let text = r#"span("a, b)", x)"#;
        let r = regions(Language::Go, text);
        let arg = scan_name_argument(text, &r, 5).unwrap();
        assert_eq!(&text[arg.start..arg.end], r#""a, b)""#);
    }

    #[test]
    fn test_scan_argument_errors() {
        let r = Regions::default();
        assert_eq!(scan_name_argument("foo(bar", &r, 4), Err(ScanError::Unterminated));
        assert_eq!(scan_name_argument("x; y)", &r, 0), Err(ScanError::StatementEnded));
        assert_eq!(scan_name_argument("a]", &r, 0), Err(ScanError::Unbalanced));
    }

    #[test]
    fn test_empty_argument() {
        let r = Regions::default();
        let arg = scan_name_argument("  )", &r, 0).unwrap();
        assert_eq!(arg.start, arg.end);
        assert!(arg.closes_call);
    }

    #[test]
    fn test_call_close() {
        let text = "startActiveSpan('x', (span) => { work(); span.end(); })";
        let r = regions(Language::JavaScript, text);
        let close = call_close(text, &r, 16).unwrap();
        assert_eq!(close, text.len() - 1);
    }
}
