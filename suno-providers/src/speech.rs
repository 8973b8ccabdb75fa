//! Text-to-speech using the ElevenLabs streaming endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use suno_core::config::SpeechProviderConfig;
use thiserror::Error;
use tracing::{debug, error};

/// Speech synthesis errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: HTTP {status}: {body}")]
    ApiError { status: u16, body: String },
}

/// Turns text into encoded audio
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize `text`, returning the raw audio bytes (MP3)
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;

    fn is_configured(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs text-to-speech client
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    voice_id: String,
    stability: f32,
    similarity_boost: f32,
}

impl ElevenLabsClient {
    pub fn from_config(config: &SpeechProviderConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: Some(config.api_key.clone()).filter(|k| !k.trim().is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            voice_id: config.voice_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/text-to-speech/{}/stream", self.api_base, self.voice_id)
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let api_key = self.api_key.as_ref().ok_or(SpeechError::NoApiKey)?;
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let body = SpeechRequest {
            text,
            voice_settings: VoiceSettings {
                stability: self.stability,
                similarity_boost: self.similarity_boost,
            },
        };

        debug!(voice_id = %self.voice_id, chars = text.len(), "Requesting speech synthesis");

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "ElevenLabs API error: {}", body);
            return Err(SpeechError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, api_key: &str) -> SpeechProviderConfig {
        SpeechProviderConfig {
            api_key: api_key.to_string(),
            api_base: server.uri(),
            voice_id: "voice123".to_string(),
            ..SpeechProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text-to-speech/voice123/stream"))
            .and(header("xi-api-key", "el-test"))
            .and(body_json(json!({
                "text": "Namaste",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.75}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x49, 0x44, 0x33]))
            .expect(1)
            .mount(&server)
            .await;

        let client = ElevenLabsClient::from_config(&config_for(&server, "el-test")).unwrap();
        let audio = client.synthesize("Namaste").await.unwrap();
        assert_eq!(audio, vec![0x49, 0x44, 0x33]);
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = ElevenLabsClient::from_config(&config_for(&server, "el-test")).unwrap();
        match client.synthesize("hello").await {
            Err(SpeechError::ApiError { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_and_empty_text() {
        let server = MockServer::start().await;
        let client = ElevenLabsClient::from_config(&config_for(&server, "")).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.synthesize("hello").await,
            Err(SpeechError::NoApiKey)
        ));

        let client = ElevenLabsClient::from_config(&config_for(&server, "el-test")).unwrap();
        assert!(matches!(
            client.synthesize("   ").await,
            Err(SpeechError::EmptyText)
        ));
    }
}
