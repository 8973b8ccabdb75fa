//! One-shot story generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use suno_core::config::StoriesConfig;
use suno_core::utils::{Clock, SystemClock};
use suno_providers::{LLMProvider, Message, ProviderError};
use thiserror::Error;
use tracing::info;

const STORYTELLER_PROMPT: &str =
    "You are a creative storyteller. Generate an engaging story based on the user's prompt.";

const PROMPT_CHARS: std::ops::RangeInclusive<usize> = 10..=2000;
const MAX_GENRE_CHARS: usize = 50;
const MAX_TOKENS: std::ops::RangeInclusive<u32> = 100..=2000;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("invalid story request: {0}")]
    Invalid(String),

    #[error("Error generating story: {0}")]
    Provider(#[from] ProviderError),
}

/// Parameters for one story
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoryRequest {
    pub prompt: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl StoryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StoryError> {
        let prompt_len = self.prompt.trim().chars().count();
        if prompt_len == 0 {
            return Err(StoryError::EmptyPrompt);
        }
        if !PROMPT_CHARS.contains(&prompt_len) {
            return Err(StoryError::Invalid(format!(
                "prompt must be between {} and {} characters",
                PROMPT_CHARS.start(),
                PROMPT_CHARS.end()
            )));
        }
        if let Some(genre) = &self.genre {
            if genre.chars().count() > MAX_GENRE_CHARS {
                return Err(StoryError::Invalid(format!(
                    "genre must be at most {} characters",
                    MAX_GENRE_CHARS
                )));
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            if !MAX_TOKENS.contains(&max_tokens) {
                return Err(StoryError::Invalid(format!(
                    "max_tokens must be between {} and {}",
                    MAX_TOKENS.start(),
                    MAX_TOKENS.end()
                )));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(StoryError::Invalid(
                    "temperature must be between 0.0 and 1.0".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A generated story
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedStory {
    pub prompt: String,
    pub genre: Option<String>,
    pub generated_content: String,
    pub model_used: String,
    pub tokens_used: Option<i64>,
    pub generated_at: DateTime<Utc>,
}

/// Stateless story generator over a chat provider
pub struct StoryGenerator {
    provider: Arc<dyn LLMProvider>,
    clock: Arc<dyn Clock>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl StoryGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &StoriesConfig, default_model: &str) -> Self {
        Self {
            provider,
            clock: Arc::new(SystemClock),
            model: config
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn system_prompt(genre: Option<&str>) -> String {
        match genre.map(str::trim).filter(|g| !g.is_empty()) {
            Some(genre) => format!("{} The story should be in the {} genre.", STORYTELLER_PROMPT, genre),
            None => STORYTELLER_PROMPT.to_string(),
        }
    }

    pub async fn generate(&self, request: StoryRequest) -> Result<GeneratedStory, StoryError> {
        request.validate()?;

        let messages = vec![
            Message::system(Self::system_prompt(request.genre.as_deref())),
            Message::user(request.prompt.clone()),
        ];
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);
        let temperature = request.temperature.unwrap_or(self.temperature);

        let response = self
            .provider
            .chat(
                messages,
                Some(self.model.clone()),
                max_tokens,
                f64::from(temperature),
            )
            .await?;

        let tokens_used = response.total_tokens();
        let model_used = response.model.clone().unwrap_or_else(|| self.model.clone());
        let generated_content = response.into_text()?;

        info!(model = %model_used, tokens = ?tokens_used, "Story generated");

        Ok(GeneratedStory {
            prompt: request.prompt,
            genre: request.genre,
            generated_content,
            model_used,
            tokens_used,
            generated_at: self.clock.now(),
        })
    }
}
