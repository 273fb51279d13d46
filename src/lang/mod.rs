// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language detection and per-language lexical profiles.
//!
//! A [`LanguageProfile`] is pure data: the call shapes that mark telemetry
//! constructs, comment and string syntax, block style, and the signature
//! shapes used for boundary classification. Profiles are compiled once into
//! the process-wide [`ProfileRegistry`] and never mutated afterwards.
//!
//! Adding a language means adding a table in [`tables`] and a variant to
//! [`Language`]; the extractor and context builder contain no
//! per-language branches.

mod profile;
pub mod tables;

pub use profile::{
    BlockStyle, CallShape, CommentSyntax, CompiledProfile, CompiledShape, ConstructKind,
    EntryKind, EntryShape, LanguageProfile, ProfileRegistry, ScopeStyle,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Languages with a built-in profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    JavaScript,
    TypeScript,
    Java,
    CSharp,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 6] = [
        Self::Go,
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Java,
        Self::CSharp,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::CSharp => "csharp",
        }
    }

    /// Detect language from a file extension (without the dot).
    ///
    /// Kotlin and Scala sources are analyzed with the Java profile.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "go" => Some(Self::Go),
            "py" | "pyi" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "java" | "kt" | "kts" | "scala" => Some(Self::Java),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }

    /// Detect language from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Guess the language from file content when the extension is unknown.
    pub fn sniff(text: &str) -> Option<Self> {
        let head: String = text.lines().take(50).collect::<Vec<_>>().join("\n");
        let es_module = head.contains(" from '") || head.contains(" from \"");
        let bare_import = head.starts_with("import ") || head.contains("\nimport ");
        if head.contains("package main") || head.contains("\nfunc ") || head.starts_with("func ") {
            Some(Self::Go)
        } else if head.contains("using System") || head.contains("namespace ") {
            Some(Self::CSharp)
        } else if head.contains("public class") || head.contains("import java.") {
            Some(Self::Java)
        } else if head.contains("def ") || (bare_import && !es_module) {
            Some(Self::Python)
        } else if head.contains("function") || head.contains("const ") || head.contains("require(") {
            Some(Self::JavaScript)
        } else {
            None
        }
    }

    /// Detect from path first, then content.
    pub fn detect(path: &Path, text: &str) -> Option<Self> {
        Self::from_path(path).or_else(|| Self::sniff(text))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a language name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLanguageError(pub String);

impl fmt::Display for ParseLanguageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown language: {}", self.0)
    }
}

impl std::error::Error for ParseLanguageError {}

impl FromStr for Language {
    type Err = ParseLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "go" | "golang" => Ok(Self::Go),
            "python" | "py" => Ok(Self::Python),
            "javascript" | "js" | "node" => Ok(Self::JavaScript),
            "typescript" | "ts" => Ok(Self::TypeScript),
            "java" | "kotlin" | "scala" => Ok(Self::Java),
            "csharp" | "c#" | "cs" | "dotnet" => Ok(Self::CSharp),
            other => Err(ParseLanguageError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("go"), Some(Language::Go));
        assert_eq!(Language::from_extension("PY"), Some(Language::Python));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("kt"), Some(Language::Java));
        assert_eq!(Language::from_extension("cs"), Some(Language::CSharp));
        assert_eq!(Language::from_extension("rs"), None);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("golang".parse::<Language>(), Ok(Language::Go));
        assert_eq!("C#".parse::<Language>(), Ok(Language::CSharp));
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_sniff() {
        assert_eq!(Language::sniff("package main\n\nfunc main() {}\n"), Some(Language::Go));
        assert_eq!(
            Language::sniff("import os\n\ndef handler(event, context):\n    pass\n"),
            Some(Language::Python)
        );
        assert_eq!(
            Language::sniff("using System;\nnamespace Shop {}\n"),
            Some(Language::CSharp)
        );
        assert_eq!(Language::sniff("hello world"), None);
    }

    #[test]
    fn test_detect_prefers_extension() {
        let lang = Language::detect(Path::new("svc/handler.py"), "package main");
        assert_eq!(lang, Some(Language::Python));
    }

    #[test]
    fn test_every_language_has_profile() {
        for lang in Language::ALL {
            assert!(ProfileRegistry::global().get(lang).is_some(), "{lang}");
        }
    }
}
