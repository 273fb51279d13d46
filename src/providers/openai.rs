// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI-compatible provider.
//!
//! Works with OpenAI, Ollama (`/v1`), and any service exposing the Chat
//! Completions API. See
//! [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use tracing::debug;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::ProviderError;

use super::{Completion, CompletionRequest, Provider, ProviderConfig};

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Ollama API base URL.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI-compatible provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
    provider_name: String,
}

impl OpenAIProvider {
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let provider_name = Self::detect_provider_name(&base_url);

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url,
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
            provider_name,
        })
    }

    fn detect_provider_name(base_url: &str) -> String {
        if base_url.contains("openai.com") {
            "OpenAI".to_string()
        } else if base_url.contains(":11434") || base_url.contains("ollama") {
            "Ollama".to_string()
        } else if base_url.contains("azure") {
            "Azure OpenAI".to_string()
        } else {
            "OpenAI-Compatible".to_string()
        }
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn handle_error_response(status_code: u16, body: &str) -> ProviderError {
        match serde_json::from_str::<ApiError>(body) {
            Ok(error) => {
                let message = error.error.message;
                match error.error.code.as_deref().or(error.error.error_type.as_deref()) {
                    Some("authentication_error") | Some("invalid_api_key") => {
                        ProviderError::AuthError(message)
                    }
                    Some("rate_limit_error") | Some("rate_limit_exceeded") => {
                        ProviderError::RateLimited(message)
                    }
                    Some("model_not_found") => ProviderError::ModelNotFound(message),
                    _ => ProviderError::api(message, status_code),
                }
            }
            Err(_) if status_code == 401 => ProviderError::AuthError(body.to_string()),
            Err(_) if status_code == 429 => ProviderError::RateLimited(body.to_string()),
            Err(_) => ProviderError::api(body.to_string(), status_code),
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();
        debug!(provider = %self.provider_name, model = %self.model, "Sending completion request");

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("content-type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.header("authorization", format!("Bearer {}", api_key));
        }

        let response = req.json(&self.build_request(request)).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(start.elapsed().as_millis() as u64)
            } else {
                ProviderError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status.as_u16(), &error_text));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        #[cfg(feature = "telemetry")]
        {
            let operation = format!("{}.complete", self.provider_name.to_lowercase().replace(' ', "_"));
            GLOBAL_METRICS.record_operation(&operation, start.elapsed());
        }

        Ok(Completion {
            text,
            input_tokens: api_response.usage.as_ref().map_or(0, |u| u.prompt_tokens),
            output_tokens: api_response.usage.as_ref().map_or(0, |u| u.completion_tokens),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name_detection() {
        let config = ProviderConfig::default();
        let openai = OpenAIProvider::new(Some("k".into()), "gpt-4o-mini", OPENAI_BASE_URL, &config).unwrap();
        assert_eq!(openai.name(), "OpenAI");
        let ollama = OpenAIProvider::new(None, "llama3.2", OLLAMA_BASE_URL, &config).unwrap();
        assert_eq!(ollama.name(), "Ollama");
        let other = OpenAIProvider::new(None, "m", "https://llm.internal.example/v1/", &config).unwrap();
        assert_eq!(other.name(), "OpenAI-Compatible");
        assert_eq!(other.base_url, "https://llm.internal.example/v1");
    }

    #[test]
    fn test_request_includes_system_message() {
        let config = ProviderConfig {
            temperature: Some(0.0),
            ..Default::default()
        };
        let p = OpenAIProvider::new(None, "llama3.2", OLLAMA_BASE_URL, &config).unwrap();
        let request = CompletionRequest::new("system text", "user text");
        let json = serde_json::to_value(p.build_request(&request)).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user text");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert!(matches!(
            OpenAIProvider::handle_error_response(401, body),
            ProviderError::AuthError(_)
        ));
        assert!(matches!(
            OpenAIProvider::handle_error_response(429, "too many"),
            ProviderError::RateLimited(_)
        ));
        assert!(OpenAIProvider::handle_error_response(503, "unavailable").is_retryable());
    }
}
