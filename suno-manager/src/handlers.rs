use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use suno_agent::{GeneratedStory, StoryError, StoryRequest, TurnError};
use suno_core::session::ChatMessage;
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;

/// Header carrying the session key when the body does not
pub const SESSION_HEADER: &str = "x-session-id";

/// Errors returned to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    EmptyInput(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("API key not configured")]
    NotConfigured,

    #[error("Speech synthesis is not configured")]
    SpeechUnavailable,

    #[error("TTS failed: {0}")]
    TtsFailed(String),

    #[error("{0}")]
    StoryFailed(String),

    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::EmptyInput(_) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "EmptyInput", "message": message}),
            ),
            ApiError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "InvalidRequest", "message": message}),
            ),
            ApiError::NotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "NotConfigured", "message": message}),
            ),
            ApiError::SpeechUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "SpeechUnavailable", "message": message}),
            ),
            ApiError::TtsFailed(details) => (
                StatusCode::BAD_GATEWAY,
                json!({"error": "TTS failed", "details": details}),
            ),
            ApiError::StoryFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "StoryFailed", "message": message}),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "InternalError"}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TurnError> for ApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::EmptyInput | TurnError::EmptySessionKey => {
                ApiError::EmptyInput(err.to_string())
            }
            TurnError::Session(e) => {
                tracing::error!("Session storage failed: {}", e);
                ApiError::Internal
            }
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(err: StoryError) -> Self {
        match err {
            StoryError::EmptyPrompt | StoryError::Invalid(_) => {
                ApiError::InvalidRequest(err.to_string())
            }
            StoryError::Provider(_) => {
                tracing::error!("{}", err);
                ApiError::StoryFailed(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<suno_core::Error> for ApiError {
    fn from(err: suno_core::Error) -> Self {
        tracing::error!("Session storage failed: {}", err);
        ApiError::Internal
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "text")]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct VoiceChatResponse {
    pub success: bool,
    pub response: String,
    pub audio_url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Body value first, then the session header, then a fresh UUID
fn resolve_session_id(from_body: Option<String>, headers: &HeaderMap) -> String {
    from_body
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn root_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"message": format!("Welcome to {} API", state.app_name)}))
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"message": "API is healthy"}))
}

pub async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload?;
    let session_id = resolve_session_id(payload.session_id, &headers);
    let reply = state
        .conversation
        .handle_turn(&session_id, &payload.message)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.text,
        session_id,
    }))
}

pub async fn voice_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let Json(payload) = payload?;
    let speech = state.speech.clone().ok_or(ApiError::SpeechUnavailable)?;
    let session_id = resolve_session_id(payload.session_id, &headers);
    let reply = state
        .conversation
        .handle_turn(&session_id, &payload.message)
        .await?;

    let audio = speech.synthesize(&reply.text).await.map_err(|e| {
        tracing::warn!("Speech synthesis failed: {}", e);
        ApiError::TtsFailed(e.to_string())
    })?;

    let file_name = format!("{}.mp3", Uuid::new_v4());
    let write = async {
        tokio::fs::create_dir_all(&state.audio_dir).await?;
        tokio::fs::write(state.audio_dir.join(&file_name), &audio).await
    };
    if let Err(e) = write.await {
        tracing::error!("Failed to write audio file: {}", e);
        return Err(ApiError::Internal);
    }

    Ok(Json(VoiceChatResponse {
        success: true,
        response: reply.text,
        audio_url: format!("/static/{}", file_name),
        session_id,
    }))
}

pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state.conversation.history(&key).await?;
    Ok(Json(HistoryResponse {
        session_id: key,
        messages,
    }))
}

pub async fn reset_session_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.conversation.reset_session(&key).await?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn generate_story_handler(
    State(state): State<AppState>,
    request: Result<Json<StoryRequest>, JsonRejection>,
) -> Result<Json<GeneratedStory>, ApiError> {
    let Json(request) = request?;
    let stories = state.stories.clone().ok_or(ApiError::NotConfigured)?;
    let story = stories.generate(request).await?;
    Ok(Json(story))
}
