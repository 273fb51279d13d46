// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chat completion providers backing the LLM judge.
//!
//! - [`anthropic::AnthropicProvider`] - Claude models via the Messages API
//! - [`openai::OpenAIProvider`] - OpenAI, Ollama, and OpenAI-compatible APIs
//!
//! The judge needs one thing from a provider: send a system prompt and a
//! user prompt, get text back. Streaming and tool use are not involved.
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `TRACELINT_PROVIDER` | Override provider: `anthropic`, `openai`, `ollama` |
//! | `TRACELINT_MODEL` | Override default model |
//! | `ANTHROPIC_API_KEY` | Anthropic API key |
//! | `OPENAI_API_KEY` | OpenAI API key |
//! | `OPENAI_BASE_URL` | Custom OpenAI base URL |
//! | `OLLAMA_HOST` | Custom Ollama URL (default: localhost:11434) |

pub mod anthropic;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

use crate::config::ResolvedConfig;
use crate::error::ProviderError;

/// One prompt for a single, non-streaming completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

/// Text returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A chat completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}

pub type BoxedProvider = Arc<dyn Provider>;

/// Connection settings for a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature; judgments default to 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// HTTP request timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: Some(model.into()),
            ..Default::default()
        }
    }
}

/// Supported provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Anthropic,
    OpenAI,
    Ollama,
    /// Any OpenAI-compatible API; needs a base URL.
    OpenAICompatible,
}

impl ProviderType {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAI | Self::OpenAICompatible => "gpt-4o-mini",
            Self::Ollama => "llama3.2",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAI | Self::OpenAICompatible => openai::OPENAI_BASE_URL,
            Self::Ollama => openai::OLLAMA_BASE_URL,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Anthropic | Self::OpenAI)
    }

    /// Environment variable holding the API key, if any.
    fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAI | Self::OpenAICompatible => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

/// Error type for parsing a provider type from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProviderTypeError;

impl std::fmt::Display for ParseProviderTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider type")
    }
}

impl std::error::Error for ParseProviderTypeError {}

impl std::str::FromStr for ProviderType {
    type Err = ParseProviderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "gpt" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "openai-compatible" | "openai_compatible" => Ok(Self::OpenAICompatible),
            _ => Err(ParseProviderTypeError),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "Anthropic"),
            Self::OpenAI => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
            Self::OpenAICompatible => write!(f, "OpenAI-Compatible"),
        }
    }
}

/// Create a provider instance from type and configuration.
pub fn create_provider(
    provider_type: ProviderType,
    config: ProviderConfig,
) -> Result<BoxedProvider, ProviderError> {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider_type.default_model().to_string());
    let base_url = match (provider_type, config.base_url.clone()) {
        (_, Some(url)) => url,
        (ProviderType::OpenAICompatible, None) => {
            return Err(ProviderError::NotConfigured(
                "base_url required for OpenAI-Compatible".to_string(),
            ))
        }
        (t, None) => t.default_base_url().to_string(),
    };

    match provider_type {
        ProviderType::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("API key required for Anthropic".to_string())
            })?;
            Ok(Arc::new(AnthropicProvider::new(api_key, model, base_url, &config)?))
        }
        ProviderType::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                ProviderError::NotConfigured("API key required for OpenAI".to_string())
            })?;
            Ok(Arc::new(OpenAIProvider::new(Some(api_key), model, base_url, &config)?))
        }
        ProviderType::Ollama => Ok(Arc::new(OpenAIProvider::new(None, model, base_url, &config)?)),
        ProviderType::OpenAICompatible => Ok(Arc::new(OpenAIProvider::new(
            config.api_key.clone(),
            model,
            base_url,
            &config,
        )?)),
    }
}

/// Pick a provider type from the environment: Anthropic, then OpenAI, then
/// a local Ollama.
pub fn detect_provider_type() -> ProviderType {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        ProviderType::Anthropic
    } else if std::env::var("OPENAI_API_KEY").is_ok() {
        ProviderType::OpenAI
    } else {
        ProviderType::Ollama
    }
}

/// Create the judge provider from a resolved configuration.
///
/// `auto` detects a provider from the environment. `offline` never reaches
/// this function; the caller uses the heuristic judge instead.
pub fn create_provider_from_config(config: &ResolvedConfig) -> Result<BoxedProvider, ProviderError> {
    let provider_type = if config.provider.eq_ignore_ascii_case("auto") {
        detect_provider_type()
    } else {
        config.provider.parse().map_err(|_| {
            ProviderError::NotConfigured(format!("Unknown provider: {}", config.provider))
        })?
    };

    let base_url = config.base_url.clone().or_else(|| match provider_type {
        ProviderType::Ollama => std::env::var("OLLAMA_HOST")
            .ok()
            .map(|h| format!("{}/v1", h.trim_end_matches('/'))),
        ProviderType::OpenAI | ProviderType::OpenAICompatible => std::env::var("OPENAI_BASE_URL").ok(),
        ProviderType::Anthropic => None,
    });

    let provider_config = ProviderConfig {
        api_key: provider_type.api_key_var().and_then(|v| std::env::var(v).ok()),
        base_url,
        model: config.model.clone(),
        temperature: Some(0.0),
        max_tokens: Some(1024),
        timeout_ms: Some(config.oracle_timeout_ms),
    };

    create_provider(provider_type, provider_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_from_str() {
        assert_eq!("anthropic".parse::<ProviderType>(), Ok(ProviderType::Anthropic));
        assert_eq!("Claude".parse::<ProviderType>(), Ok(ProviderType::Anthropic));
        assert_eq!("openai".parse::<ProviderType>(), Ok(ProviderType::OpenAI));
        assert_eq!("ollama".parse::<ProviderType>(), Ok(ProviderType::Ollama));
        assert!("offline".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_provider_type_requires_api_key() {
        assert!(ProviderType::Anthropic.requires_api_key());
        assert!(ProviderType::OpenAI.requires_api_key());
        assert!(!ProviderType::Ollama.requires_api_key());
    }

    #[test]
    fn test_create_provider_missing_key() {
        let result = create_provider(ProviderType::Anthropic, ProviderConfig::default());
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_create_provider_compatible_needs_base_url() {
        let result = create_provider(ProviderType::OpenAICompatible, ProviderConfig::default());
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_create_providers() {
        let provider =
            create_provider(ProviderType::Anthropic, ProviderConfig::new("k", "claude-haiku")).unwrap();
        assert_eq!(provider.name(), "Anthropic");
        assert_eq!(provider.model(), "claude-haiku");

        let provider = create_provider(
            ProviderType::Ollama,
            ProviderConfig {
                model: Some("llama3.2".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(provider.name(), "Ollama");
        assert_eq!(provider.model(), "llama3.2");
    }

    #[test]
    fn test_create_provider_from_config_unknown() {
        let config = ResolvedConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_provider_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
