//! Base trait for chat-completion providers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use suno_core::session::{ChatMessage, Role};
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// How a failed call should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider could not be reached or refused the request
    Unavailable,
    /// The provider answered but without a usable completion
    Malformed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Malformed => "malformed",
        }
    }
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::HttpError(e) if e.is_decode() => FailureKind::Malformed,
            ProviderError::JsonError(_) | ProviderError::MalformedResponse(_) => {
                FailureKind::Malformed
            }
            ProviderError::HttpError(_)
            | ProviderError::Timeout(_)
            | ProviderError::ApiError { .. }
            | ProviderError::ConfigError(_) => FailureKind::Unavailable,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Response from a chat-completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    #[serde(default = "default_finish_reason")]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: HashMap<String, i64>,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

impl LLMResponse {
    /// The completion text, or `MalformedResponse` when it is missing or blank
    pub fn into_text(self) -> ProviderResult<String> {
        match self.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(ProviderError::MalformedResponse(
                "completion content is empty".to_string(),
            )),
            None => Err(ProviderError::MalformedResponse(
                "completion has no content field".to_string(),
            )),
        }
    }

    pub fn total_tokens(&self) -> Option<i64> {
        self.usage.get("total_tokens").copied()
    }
}

/// A message in the chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&ChatMessage> for Message {
    fn from(msg: &ChatMessage) -> Self {
        Self::new(msg.role, msg.content.clone())
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> ProviderResult<LLMResponse>;

    /// Get the default model for this provider
    fn get_default_model(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_text() {
        let response = LLMResponse {
            content: Some("Namaste!".to_string()),
            finish_reason: "stop".to_string(),
            usage: HashMap::new(),
            model: None,
        };
        assert_eq!(response.into_text().unwrap(), "Namaste!");
    }

    #[test]
    fn test_missing_content_is_malformed() {
        let response = LLMResponse {
            content: None,
            finish_reason: "stop".to_string(),
            usage: HashMap::new(),
            model: None,
        };
        let err = response.into_text().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);

        let blank = LLMResponse {
            content: Some("  ".to_string()),
            finish_reason: "stop".to_string(),
            usage: HashMap::new(),
            model: None,
        };
        assert_eq!(blank.into_text().unwrap_err().kind(), FailureKind::Malformed);
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(10)).kind(),
            FailureKind::Unavailable
        );
        assert_eq!(
            ProviderError::ApiError {
                status: 503,
                body: "overloaded".to_string()
            }
            .kind(),
            FailureKind::Unavailable
        );
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            ProviderError::from(json_err).kind(),
            FailureKind::Malformed
        );
    }

    #[test]
    fn test_message_serializes_role_lowercase() {
        let value = serde_json::to_value(Message::system("persona")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "system", "content": "persona"}));
    }
}
