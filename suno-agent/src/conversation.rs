//! Conversational session store: one user turn in, one reply out

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use suno_core::config::Config;
use suno_core::session::{ChatMessage, Role, SessionInfo, SessionManager};
use suno_core::utils::{truncate, Clock, SystemClock};
use suno_providers::{LLMProvider, Message, ProviderError, ProviderResult};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::intercept::DateIntercept;

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    /// Answered locally without a provider call
    Intercept,
    Provider,
    /// The provider failed and the fixed fallback text was returned
    Fallback,
}

/// Reply to one user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub text: String,
    pub source: ReplySource,
}

/// Errors a caller can get back from a turn
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("message must not be empty")]
    EmptyInput,

    #[error("session key must not be empty")]
    EmptySessionKey,

    #[error(transparent)]
    Session(#[from] suno_core::Error),
}

/// Provider call parameters for a turn
#[derive(Debug, Clone)]
struct TurnSettings {
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
    fallback_reply: String,
    record_intercepted: bool,
}

/// Owns session histories and drives each turn through the intercept,
/// the context window and the chat provider
pub struct Conversation {
    sessions: Arc<SessionManager>,
    provider: Arc<dyn LLMProvider>,
    clock: Arc<dyn Clock>,
    context: ContextBuilder,
    intercept: DateIntercept,
    settings: TurnSettings,
}

impl Conversation {
    /// Create a conversation from the loaded configuration
    pub fn new(
        sessions: Arc<SessionManager>,
        provider: Arc<dyn LLMProvider>,
        config: &Config,
    ) -> suno_core::Result<Self> {
        let assistant = &config.assistant;
        if assistant.context_window == 0 {
            return Err(suno_core::Error::Validation(
                "assistant.context_window must be >= 1".to_string(),
            ));
        }
        let model = if assistant.model.trim().is_empty() {
            provider.get_default_model()
        } else {
            assistant.model.clone()
        };

        Ok(Self {
            sessions,
            provider,
            clock: Arc::new(SystemClock),
            context: ContextBuilder::new(assistant.persona.clone(), assistant.context_window),
            intercept: DateIntercept::from_config(&config.intercept)?,
            settings: TurnSettings {
                model,
                max_tokens: assistant.max_tokens,
                temperature: f64::from(assistant.temperature),
                timeout: Duration::from_secs(config.providers.chat.timeout_secs),
                fallback_reply: assistant.fallback_reply.clone(),
                record_intercepted: assistant.record_intercepted,
            },
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on a single provider call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Process one user turn for `session_key`.
    ///
    /// Turns on the same key are serialized for their whole duration,
    /// provider call included. Provider failures never surface as errors;
    /// they produce the fallback reply and leave the user message in history.
    pub async fn handle_turn(
        &self,
        session_key: &str,
        user_text: &str,
    ) -> Result<TurnReply, TurnError> {
        if session_key.trim().is_empty() {
            return Err(TurnError::EmptySessionKey);
        }
        if user_text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let mut session = self.sessions.lock(session_key).await?;
        debug!(
            session = session_key,
            text = %truncate(user_text, 80),
            "Handling turn"
        );

        if let Some(answer) = self.intercept.try_answer(user_text, self.clock.as_ref()) {
            debug!(session = session_key, "Answered date question locally");
            if self.settings.record_intercepted {
                session.append(Role::User, user_text)?;
                session.append(Role::Assistant, answer.clone())?;
            }
            return Ok(TurnReply {
                text: answer,
                source: ReplySource::Intercept,
            });
        }

        session.append(Role::User, user_text)?;
        let messages = self.context.build_messages(session.messages());

        match self.complete(messages).await {
            Ok(text) => {
                session.append(Role::Assistant, text.clone())?;
                Ok(TurnReply {
                    text,
                    source: ReplySource::Provider,
                })
            }
            Err(e) => {
                warn!(
                    session = session_key,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Chat provider failed, sending fallback reply"
                );
                Ok(TurnReply {
                    text: self.settings.fallback_reply.clone(),
                    source: ReplySource::Fallback,
                })
            }
        }
    }

    async fn complete(&self, messages: Vec<Message>) -> ProviderResult<String> {
        let timeout = self.settings.timeout;
        let call = self.provider.chat(
            messages,
            Some(self.settings.model.clone()),
            self.settings.max_tokens,
            self.settings.temperature,
        );
        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;
        response.into_text()
    }

    /// Clear a session's history. Unknown keys are fine and repeating it is harmless.
    pub async fn reset_session(&self, session_key: &str) -> suno_core::Result<()> {
        self.sessions.reset(session_key).await?;
        info!(session = session_key, "Session history cleared");
        Ok(())
    }

    /// Snapshot of a session's stored history
    pub async fn history(&self, session_key: &str) -> suno_core::Result<Vec<ChatMessage>> {
        self.sessions.history(session_key).await
    }

    pub fn list_sessions(&self) -> suno_core::Result<Vec<SessionInfo>> {
        self.sessions.list()
    }
}
