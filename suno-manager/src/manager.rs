use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use suno_agent::{Conversation, StoryGenerator};
use suno_core::config::Config;
use suno_core::session::SessionManager;
use suno_core::utils::expand_home;
use suno_providers::{ElevenLabsClient, LLMProvider, OpenAICompatClient, ProviderRegistry};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::server::run_server;
use crate::state::AppState;

/// Wires configuration into the server and its background tasks
pub struct Manager {
    config: Config,
    state: AppState,
}

impl Manager {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let sessions = Arc::new(SessionManager::from_config(&config.sessions)?);

        let chat = &config.providers.chat;
        let provider: Arc<dyn LLMProvider> = Arc::new(OpenAICompatClient::from_config(
            chat,
            config.assistant.model.clone(),
        )?);
        let is_local = ProviderRegistry::new()
            .find_by_name(&chat.provider)
            .map_or(false, |spec| spec.is_local);
        let chat_ready = chat.is_configured() || is_local;
        if !chat_ready {
            warn!(
                provider = %chat.provider,
                "No chat API key configured; chat replies will use the fallback text"
            );
        }

        let conversation = Conversation::new(sessions, provider.clone(), &config)?;
        let mut state = AppState::new(
            config.server.app_name.clone(),
            Arc::new(conversation),
            expand_home(&config.server.audio_dir),
        );

        if chat_ready {
            let stories = StoryGenerator::new(provider, &config.stories, &config.assistant.model);
            state = state.with_stories(Arc::new(stories));
        }

        if config.providers.speech.is_configured() {
            let speech = ElevenLabsClient::from_config(&config.providers.speech)?;
            state = state.with_speech(Arc::new(speech));
        } else {
            info!("No speech API key configured; /voice-chat is disabled");
        }

        Ok(Self { config, state })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Bind address; `server.host` may be an IP or a resolvable host name
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let server = &self.config.server;
        (server.host.as_str(), server.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("cannot resolve server host '{}'", server.host))
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self, shutdown_tx: broadcast::Sender<()>) -> anyhow::Result<()> {
        let addr = self.addr()?;

        if let Some(ttl) = self.config.sessions.idle_ttl_secs {
            let sessions = self.state.conversation.sessions().clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            let ttl = Duration::from_secs(ttl);
            let period = (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(300));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            sessions.evict_idle(ttl);
                        }
                        _ = shutdown_rx.recv() => break,
                    }
                }
            });
            info!(ttl_secs = ttl.as_secs(), "Idle session eviction enabled");
        }

        run_server(self.state, addr, shutdown_tx.subscribe()).await
    }
}
