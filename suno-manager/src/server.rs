use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    chat_handler, generate_story_handler, get_session_handler, health_handler,
    reset_session_handler, root_handler, voice_chat_handler,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.audio_dir);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/voice-chat", post(voice_chat_handler))
        .route(
            "/sessions/:key",
            get(get_session_handler).delete(reset_session_handler),
        )
        .route("/stories/generate", post(generate_story_handler))
        .nest_service("/static", static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use suno_agent::{Conversation, StoryGenerator};
    use suno_core::config::{Config, StoriesConfig};
    use suno_core::session::SessionManager;
    use suno_providers::{
        LLMProvider, LLMResponse, Message, ProviderError, ProviderResult, SpeechError,
        SpeechProvider,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoProvider {
        fail: bool,
    }

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _model: Option<String>,
            _max_tokens: u32,
            _temperature: f64,
        ) -> ProviderResult<LLMResponse> {
            if self.fail {
                return Err(ProviderError::MalformedResponse("no choices".to_string()));
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(LLMResponse {
                content: Some(format!("re: {}", last)),
                finish_reason: "stop".to_string(),
                usage: HashMap::from([("total_tokens".to_string(), 7)]),
                model: None,
            })
        }

        fn get_default_model(&self) -> String {
            "stub".to_string()
        }
    }

    struct FakeSpeech {
        fail: bool,
    }

    #[async_trait]
    impl SpeechProvider for FakeSpeech {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SpeechError> {
            if self.fail {
                return Err(SpeechError::ApiError {
                    status: 401,
                    body: "bad key".to_string(),
                });
            }
            Ok(b"ID3".to_vec())
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    fn state(audio_dir: &TempDir, provider_fails: bool) -> AppState {
        let provider: Arc<dyn LLMProvider> = Arc::new(EchoProvider {
            fail: provider_fails,
        });
        let conversation = Conversation::new(
            Arc::new(SessionManager::in_memory()),
            provider.clone(),
            &Config::default(),
        )
        .unwrap();
        AppState::new("SunoAI", Arc::new(conversation), audio_dir.path().to_path_buf())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));

        let (status, body) = send(
            app.clone(),
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Welcome to SunoAI API"}));

        let (_, body) = send(
            app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body, json!({"message": "API is healthy"}));
    }

    #[tokio::test]
    async fn test_chat_keeps_history_per_session() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));

        let (status, body) = send(
            app.clone(),
            post_json("/chat", json!({"message": "Hello", "session_id": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "re: Hello");
        assert_eq!(body["session_id"], "abc");

        let (_, body) = send(
            app.clone(),
            Request::builder()
                .uri("/sessions/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "user");

        let (status, body) = send(
            app.clone(),
            Request::builder()
                .method("DELETE")
                .uri("/sessions/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (_, body) = send(
            app,
            Request::builder()
                .uri("/sessions/abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert!(body["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_session_from_header_or_generated() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));

        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .header("x-session-id", "hdr-1")
            .body(Body::from(json!({"text": "Hi"}).to_string()))
            .unwrap();
        let (_, body) = send(app.clone(), request).await;
        assert_eq!(body["session_id"], "hdr-1");

        let (_, body) = send(app, post_json("/chat", json!({"message": "Hi"}))).await;
        let generated = body["session_id"].as_str().unwrap();
        assert_eq!(generated.len(), 36);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));

        let (status, body) = send(app, post_json("/chat", json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "EmptyInput");
    }

    #[tokio::test]
    async fn test_malformed_body_returns_json_error() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));

        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");
        assert!(body["message"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/stories/generate")
            .body(Body::from("prompt=hi"))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_chat_fallback_on_provider_failure() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, true));

        let (status, body) = send(app, post_json("/chat", json!({"message": "Hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["response"],
            "Sorry, I couldn't connect to the AI service."
        );
    }

    #[tokio::test]
    async fn test_voice_chat_writes_audio() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false).with_speech(Arc::new(FakeSpeech { fail: false })));

        let (status, body) = send(
            app.clone(),
            post_json("/voice-chat", json!({"text": "Hello", "session_id": "v"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "re: Hello");

        let audio_url = body["audio_url"].as_str().unwrap().to_string();
        let file_name = audio_url.strip_prefix("/static/").unwrap();
        assert!(dir.path().join(file_name).exists());

        let response = app
            .oneshot(Request::builder().uri(&audio_url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ID3");
    }

    #[tokio::test]
    async fn test_voice_chat_errors() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));
        let (status, _) = send(app, post_json("/voice-chat", json!({"text": "Hello"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let app = build_router(state(&dir, false).with_speech(Arc::new(FakeSpeech { fail: true })));
        let (status, body) = send(app, post_json("/voice-chat", json!({"text": "Hello"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "TTS failed");
    }

    #[tokio::test]
    async fn test_generate_story() {
        let dir = TempDir::new().unwrap();
        let app = build_router(state(&dir, false));
        let (status, body) = send(
            app,
            post_json("/stories/generate", json!({"prompt": "A lighthouse keeper's secret"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "API key not configured");

        let provider: Arc<dyn LLMProvider> = Arc::new(EchoProvider { fail: false });
        let stories = StoryGenerator::new(provider, &StoriesConfig::default(), "llama3-8b-8192");
        let app = build_router(state(&dir, false).with_stories(Arc::new(stories)));
        let (status, body) = send(
            app,
            post_json(
                "/stories/generate",
                json!({"prompt": "A lighthouse keeper's secret", "genre": "mystery"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generated_content"], "re: A lighthouse keeper's secret");
        assert_eq!(body["tokens_used"], 7);
        assert_eq!(body["model_used"], "llama3-8b-8192");
    }
}
