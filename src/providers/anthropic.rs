// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anthropic Claude provider.
//!
//! Single-shot calls to the Messages API. See
//! [Anthropic Messages API](https://docs.anthropic.com/en/api/messages).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use tracing::debug;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::ProviderError;

use super::{Completion, CompletionRequest, Provider, ProviderConfig};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
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

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
        })
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.temperature,
        }
    }

    fn handle_error_response(status_code: u16, body: &str) -> ProviderError {
        match serde_json::from_str::<ApiError>(body) {
            Ok(error) => {
                let message = error.error.message;
                match error.error.error_type.as_str() {
                    "authentication_error" | "permission_error" => ProviderError::AuthError(message),
                    "rate_limit_error" => ProviderError::RateLimited(message),
                    "overloaded_error" => ProviderError::RateLimited("API overloaded".to_string()),
                    "not_found_error" => ProviderError::ModelNotFound(message),
                    _ => ProviderError::api(message, status_code),
                }
            }
            Err(_) => ProviderError::api(body.to_string(), status_code),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();
        debug!(model = %self.model, prompt_len = request.prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| {
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

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let text: String = api_response
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("anthropic.complete", start.elapsed());

        Ok(Completion {
            text,
            input_tokens: api_response.usage.as_ref().map_or(0, |u| u.input_tokens),
            output_tokens: api_response.usage.as_ref().map_or(0, |u| u.output_tokens),
        })
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(
            "test-key",
            "claude-sonnet-4-20250514",
            "https://api.anthropic.com/",
            &ProviderConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_shape() {
        let p = provider();
        let request = CompletionRequest::new("You judge telemetry.", "{\"span\":\"x\"}");
        let json = serde_json::to_value(p.build_request(&request)).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["system"], "You judge telemetry.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
        assert_eq!(p.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_error_mapping() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#;
        assert!(matches!(
            AnthropicProvider::handle_error_response(429, body),
            ProviderError::RateLimited(_)
        ));

        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"bad key"}}"#;
        assert!(matches!(
            AnthropicProvider::handle_error_response(401, body),
            ProviderError::AuthError(_)
        ));

        let err = AnthropicProvider::handle_error_response(502, "bad gateway");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_response_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"{\"violated\":"},{"type":"text","text":"false}"}],"usage":{"input_tokens":10,"output_tokens":3}}"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.content.iter().filter_map(|b| b.text.as_deref()).collect();
        assert_eq!(text, "{\"violated\":false}");
    }
}
