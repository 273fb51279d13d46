// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lightweight block outline: where blocks open and close, and whether a
//! block is a function, a loop, or something else.
//!
//! Brace languages are outlined by matching `{`/`}` outside masked regions.
//! Indentation languages are outlined from logical lines ending in `:`.
//! Header text is recovered by walking back from the opening delimiter until
//! parentheses balance, which picks up multi-line signatures, and then
//! attaching any decorator or annotation lines directly above.

use super::lexer::Regions;
use crate::lang::{BlockStyle, CompiledProfile};

pub type BlockId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Function { name: Option<String>, params: String },
    Loop,
    Other,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Header statement with decorator/annotation lines prepended.
    pub signature: String,
    /// Header statement alone, whitespace collapsed.
    pub statement: String,
    pub header_start: usize,
    /// Offset of the opening `{` or `:`.
    pub open: usize,
    /// Offset of the closing `}`, or the end of the last body line.
    pub close: usize,
    pub parent: Option<BlockId>,
    pub depth: usize,
}

impl Block {
    /// Whether `pos` lies in the block body.
    pub fn contains(&self, pos: usize) -> bool {
        self.open < pos && pos <= self.close
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, BlockKind::Function { .. })
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, BlockKind::Loop)
    }

    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Function { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// All blocks of a file, ordered by opening offset.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    blocks: Vec<Block>,
}

impl Outline {
    pub fn build(text: &str, regions: &Regions, profile: &CompiledProfile) -> Self {
        match profile.profile.block_style {
            BlockStyle::Braces => build_braces(text, regions, profile),
            BlockStyle::Indentation => build_indented(text, regions, profile),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Innermost block whose body contains `pos`.
    pub fn innermost_at(&self, pos: usize) -> Option<BlockId> {
        let last_opened = self.blocks.partition_point(|b| b.open < pos).checked_sub(1)?;
        let mut current = Some(last_opened);
        while let Some(id) = current {
            let block = &self.blocks[id];
            if block.contains(pos) {
                return Some(id);
            }
            current = block.parent;
        }
        None
    }

    /// `id` and its ancestors, innermost first.
    pub fn ancestors(&self, id: BlockId) -> impl Iterator<Item = &Block> + '_ {
        std::iter::successors(self.blocks.get(id), move |b| {
            b.parent.and_then(|p| self.blocks.get(p))
        })
    }

    /// Nearest function block enclosing `pos`.
    pub fn enclosing_function(&self, pos: usize) -> Option<&Block> {
        let inner = self.innermost_at(pos)?;
        self.ancestors(inner).find(|b| b.is_function())
    }

    /// The block whose header statement contains `pos`.
    pub fn block_opened_by(&self, pos: usize) -> Option<&Block> {
        let idx = self.blocks.partition_point(|b| b.open <= pos);
        self.blocks
            .get(idx)
            .filter(|b| b.header_start <= pos && pos < b.open)
    }

    /// Whether a loop block sits between `pos` and its enclosing function.
    pub fn in_loop(&self, pos: usize) -> bool {
        let Some(inner) = self.innermost_at(pos) else {
            return false;
        };
        for block in self.ancestors(inner) {
            if block.is_loop() {
                return true;
            }
            if block.is_function() && block.function_name().is_some() {
                return false;
            }
        }
        false
    }
}

fn classify(profile: &CompiledProfile, statement: &str) -> BlockKind {
    if profile.is_loop_header(statement) {
        BlockKind::Loop
    } else if let Some((name, params)) = profile.function_header(statement) {
        BlockKind::Function { name, params }
    } else {
        BlockKind::Other
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn paren_balance(line: &str) -> i64 {
    line.bytes().fold(0, |acc, b| match b {
        b')' => acc + 1,
        b'(' => acc - 1,
        _ => acc,
    })
}

struct Header {
    start: usize,
    signature: String,
    statement: String,
}

/// Recover the header statement in `text[from..to]`.
fn header_before(text: &str, from: usize, to: usize) -> Header {
    let raw = &text[from..to];
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in raw.split('\n') {
        lines.push((from + offset, line));
        offset += line.len() + 1;
    }

    let Some(last) = lines.iter().rposition(|(_, l)| !l.trim().is_empty()) else {
        return Header {
            start: to,
            signature: String::new(),
            statement: String::new(),
        };
    };

    let mut first = last;
    let mut balance = 0;
    loop {
        balance += paren_balance(lines[first].1);
        if balance <= 0 || first == 0 {
            break;
        }
        first -= 1;
    }

    let mut annotated = first;
    while annotated > 0 {
        let prev = lines[annotated - 1].1.trim_start();
        if prev.starts_with('@') || prev.starts_with('[') {
            annotated -= 1;
        } else {
            break;
        }
    }

    let statement = collapse(
        &lines[first..=last]
            .iter()
            .map(|(_, l)| *l)
            .collect::<Vec<_>>()
            .join(" "),
    );
    let mut signature_lines: Vec<String> = lines[annotated..first]
        .iter()
        .map(|(_, l)| collapse(l))
        .collect();
    signature_lines.push(statement.clone());

    let (line_start, line) = lines[annotated];
    let start = line_start + (line.len() - line.trim_start().len());

    Header {
        start,
        signature: signature_lines.join("\n"),
        statement,
    }
}

fn build_braces(text: &str, regions: &Regions, profile: &CompiledProfile) -> Outline {
    let bytes = text.as_bytes();
    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<BlockId> = Vec::new();
    let mut boundary = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(region) = regions.containing(i) {
            i = region.end.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'{' => {
                let header = header_before(text, boundary, i);
                let id = blocks.len();
                blocks.push(Block {
                    id,
                    kind: classify(profile, &header.statement),
                    signature: header.signature,
                    statement: header.statement,
                    header_start: header.start,
                    open: i,
                    close: text.len(),
                    parent: stack.last().copied(),
                    depth: stack.len(),
                });
                stack.push(id);
                boundary = i + 1;
            }
            b'}' => {
                if let Some(id) = stack.pop() {
                    blocks[id].close = i;
                }
                boundary = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    Outline { blocks }
}

struct LogicalLine {
    start: usize,
    end: usize,
    indent: usize,
    last_code: Option<usize>,
}

fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn logical_lines(text: &str, regions: &Regions) -> Vec<LogicalLine> {
    let bytes = text.as_bytes();
    let mut out: Vec<LogicalLine> = Vec::new();
    let mut depth: i64 = 0;
    let mut continued = false;
    let mut line_start = 0;

    while line_start <= text.len() {
        let line_end = text[line_start..]
            .find('\n')
            .map(|p| line_start + p)
            .unwrap_or(text.len());
        let line = &text[line_start..line_end];
        let first = line_start + (line.len() - line.trim_start().len());

        let inside_string = regions
            .containing(line_start)
            .is_some_and(|r| r.start < line_start);
        let joins = continued || inside_string;

        let mut last_code = None;
        let mut j = line_start;
        while j < line_end {
            if let Some(region) = regions.containing(j) {
                if region.kind == super::lexer::RegionKind::String {
                    last_code = Some(region.end.min(line_end).saturating_sub(1));
                }
                j = region.end.max(j + 1);
                continue;
            }
            match bytes[j] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = (depth - 1).max(0),
                _ => {}
            }
            if !bytes[j].is_ascii_whitespace() {
                last_code = Some(j);
            }
            j += 1;
        }

        let blank = first >= line_end || regions.is_comment(first);
        if joins {
            if let Some(current) = out.last_mut() {
                current.end = line_end;
                if last_code.is_some() {
                    current.last_code = last_code;
                }
            }
        } else if !blank {
            out.push(LogicalLine {
                start: first,
                end: line_end,
                indent: indent_width(line),
                last_code,
            });
        }

        let ends_with_backslash = last_code.is_some_and(|p| bytes[p] == b'\\');
        continued = depth > 0 || ends_with_backslash;
        line_start = line_end + 1;
    }

    out
}

fn build_indented(text: &str, regions: &Regions, profile: &CompiledProfile) -> Outline {
    let bytes = text.as_bytes();
    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<(BlockId, usize)> = Vec::new();
    let mut last_end = 0;
    let mut decorators: Option<usize> = None;

    for line in logical_lines(text, regions) {
        while let Some(&(id, indent)) = stack.last() {
            if line.indent <= indent {
                blocks[id].close = last_end;
                stack.pop();
            } else {
                break;
            }
        }

        if bytes[line.start] == b'@' {
            decorators.get_or_insert(line.start);
            last_end = line.end;
            continue;
        }

        if let Some(colon) = line.last_code.filter(|&p| bytes[p] == b':') {
            let statement = collapse(&text[line.start..colon]);
            let signature = match decorators {
                Some(d) => {
                    let decos: Vec<String> = text[d..line.start]
                        .lines()
                        .map(collapse)
                        .filter(|l| !l.is_empty())
                        .collect();
                    format!("{}\n{}", decos.join("\n"), statement)
                }
                None => statement.clone(),
            };
            let id = blocks.len();
            blocks.push(Block {
                id,
                kind: classify(profile, &statement),
                signature,
                statement,
                header_start: decorators.unwrap_or(line.start),
                open: colon,
                close: text.len(),
                parent: stack.last().map(|(p, _)| *p),
                depth: stack.len(),
            });
            stack.push((id, line.indent));
        }

        decorators = None;
        last_end = line.end;
    }

    for (id, _) in stack {
        blocks[id].close = last_end;
    }

    Outline { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{Language, ProfileRegistry};

    fn outline(lang: Language, text: &str) -> Outline {
        let profile = ProfileRegistry::global().get(lang).unwrap();
        let regions = Regions::scan(text, profile.profile);
        Outline::build(text, &regions, profile)
    }

    const GO_SRC: &str = r#"package main

// handler for "{"
func GetUser(w http.ResponseWriter,
	r *http.Request) {
	for _, id := range ids {
		if id == "}" {
			continue
		}
	}
}
"#;

    #[test]
    fn test_go_blocks() {
        let o = outline(Language::Go, GO_SRC);
        assert_eq!(o.blocks().len(), 3);

        let func = &o.blocks()[0];
        assert_eq!(func.function_name(), Some("GetUser"));
        assert!(func.signature.contains("http.ResponseWriter"));
        assert!(func.statement.starts_with("func GetUser("));
        assert_eq!(func.header_start, GO_SRC.find("func GetUser").unwrap());

        assert!(o.blocks()[1].is_loop());
        assert_eq!(o.blocks()[2].kind, BlockKind::Other);
        assert_eq!(o.blocks()[2].parent, Some(1));
    }

    #[test]
    fn test_innermost_and_enclosing_function() {
        let o = outline(Language::Go, GO_SRC);
        let pos = GO_SRC.find("continue").unwrap();
        assert_eq!(o.innermost_at(pos), Some(2));
        assert_eq!(o.enclosing_function(pos).and_then(|b| b.function_name()), Some("GetUser"));
        assert!(o.in_loop(pos));
        assert_eq!(o.innermost_at(0), None);
    }

    #[test]
    fn test_python_blocks_and_decorators() {
        let src = "@app.get(\"/users\")\nasync def list_users(request):\n    for u in users:\n        print(u)\n\n    return users\n\ndef helper(x,\n           y):\n    # comment\n    return x\n";
        let o = outline(Language::Python, src);
        assert_eq!(o.blocks().len(), 3);

        let list = &o.blocks()[0];
        assert_eq!(list.function_name(), Some("list_users"));
        assert!(list.signature.starts_with("@app.get"));
        assert_eq!(list.header_start, 0);
        assert!(list.contains(src.find("return users").unwrap()));
        assert!(!list.contains(src.find("def helper").unwrap()));

        let for_block = &o.blocks()[1];
        assert!(for_block.is_loop());
        assert!(!for_block.contains(src.find("return users").unwrap()));

        let helper = &o.blocks()[2];
        assert_eq!(helper.function_name(), Some("helper"));
        assert!(helper.contains(src.find("return x").unwrap()));
    }

    #[test]
    fn test_block_opened_by() {
        let src = "with tracer.start_as_current_span(\"x\"):\n    work()\nafter()\n";
        let o = outline(Language::Python, src);
        let block = o.block_opened_by(src.find("start_as").unwrap()).unwrap();
        assert!(block.contains(src.find("work").unwrap()));
        assert!(!block.contains(src.find("after").unwrap()));
    }

    #[test]
    fn test_allman_braces() {
        let src = "[HttpGet]\npublic IActionResult Get(int id)\n{\n    return Ok();\n}\n";
        let o = outline(Language::CSharp, src);
        let block = &o.blocks()[0];
        assert_eq!(block.function_name(), Some("Get"));
        assert!(block.signature.starts_with("[HttpGet]"));
    }

    #[test]
    fn test_unclosed_block_runs_to_eof() {
        let src = "func f() {\n\tx()\n";
        let o = outline(Language::Go, src);
        assert_eq!(o.blocks()[0].close, src.len());
    }
}
