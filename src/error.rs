// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for tracelint.
//!
//! Strongly-typed errors for each subsystem, defined with `thiserror`.
//! `anyhow` is used at the application edges.
//!
//! Failures inside a single file's analysis never surface here as hard errors:
//! a skipped call site is recorded on the extraction result, and an oracle
//! failure turns into a placeholder finding. Only run-level conditions
//! (unreadable input, every oracle call failing) are reported as
//! [`AnalysisError`].

use thiserror::Error;

/// Errors from chat completion providers used by the judgment oracle.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an API error without status code.
    pub fn api_message(message: impl Into<String>) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::NetworkError(_) | Self::Timeout(_) => true,
            Self::ApiError {
                status_code: Some(code),
                ..
            } => *code >= 500,
            _ => false,
        }
    }
}

/// Errors raised by the retrieval and judgment oracles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Oracle transport failure: {0}")]
    Transport(String),

    #[error("Malformed judgment: {0}")]
    Malformed(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle call cancelled")]
    Cancelled,
}

impl OracleError {
    /// Timeouts and transport hiccups are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport(_))
    }

    /// Short machine-readable label used in metrics and placeholder findings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
            Self::Unavailable(_) => "unavailable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ProviderError> for OracleError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(ms) => Self::Timeout { timeout_ms: ms },
            ProviderError::ParseError(msg) => Self::Malformed(msg),
            ProviderError::AuthError(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::ModelNotFound(_) => Self::Unavailable(err.to_string()),
            ref other if other.is_retryable() => Self::Transport(other.to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors that can occur while loading or embedding the rule corpus.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge base not found: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),
}

/// Run-level analysis failures.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Unsupported language for {0}")]
    UnsupportedLanguage(String),

    #[error("All {calls} oracle calls failed; the report would be meaningless")]
    OracleUnavailable { calls: usize },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
