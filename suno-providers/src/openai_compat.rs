//! HTTP client for OpenAI-compatible `/chat/completions` endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use suno_core::config::ChatProviderConfig;
use tracing::debug;

use crate::base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
use crate::registry::ProviderRegistry;

const FALLBACK_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

/// Client for any provider speaking the OpenAI chat-completions dialect
pub struct OpenAICompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    extra_headers: HashMap<String, String>,
    timeout: Duration,
}

impl OpenAICompatClient {
    /// Create a new client.
    ///
    /// `api_base` wins when set; otherwise the endpoint comes from the
    /// registry entry for `provider_name` or the API key prefix.
    pub fn new(
        api_key: Option<String>,
        api_base: Option<String>,
        default_model: String,
        extra_headers: Option<HashMap<String, String>>,
        provider_name: Option<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let api_base = api_base.filter(|b| !b.trim().is_empty());

        let registry = ProviderRegistry::new();
        let api_base = api_base
            .or_else(|| {
                registry
                    .resolve(provider_name.as_deref(), api_key.as_deref(), None)
                    .map(|spec| spec.default_api_base.clone())
            })
            .unwrap_or_else(|| FALLBACK_API_BASE.to_string());

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            extra_headers: extra_headers.unwrap_or_default(),
            timeout,
        })
    }

    /// Build a client from the `providers.chat` config section
    pub fn from_config(config: &ChatProviderConfig, default_model: String) -> ProviderResult<Self> {
        Self::new(
            Some(config.api_key.clone()),
            Some(config.api_base.clone()),
            default_model,
            Some(config.extra_headers.clone()),
            Some(config.provider.clone()),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    /// Convert the wire response into our standard format
    fn parse_response(response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".to_string()))?;

        let message = choice.message.ok_or_else(|| {
            ProviderError::MalformedResponse("first choice has no message".to_string())
        })?;

        let mut usage = HashMap::new();
        if let Some(u) = response.usage {
            usage.insert("prompt_tokens".to_string(), u.prompt_tokens);
            usage.insert("completion_tokens".to_string(), u.completion_tokens);
            usage.insert("total_tokens".to_string(), u.total_tokens);
        }

        Ok(LLMResponse {
            content: message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
            model: response.model,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::HttpError(err)
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> ProviderResult<LLMResponse> {
        let model = model.unwrap_or_else(|| self.default_model.clone());
        let request = ChatCompletionRequest {
            model: &model,
            messages: &messages,
            max_tokens,
            temperature,
        };

        debug!(
            api_base = %self.api_base,
            model = %model,
            messages = messages.len(),
            "Sending chat completion request"
        );

        let url = format!("{}/chat/completions", self.api_base);
        let req_builder = self.apply_headers(self.client.post(&url).json(&request));
        let response = req_builder
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        Self::parse_response(parsed)
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}
