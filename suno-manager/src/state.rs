use std::path::PathBuf;
use std::sync::Arc;
use suno_agent::{Conversation, StoryGenerator};
use suno_providers::SpeechProvider;

/// Shared handles for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub conversation: Arc<Conversation>,
    /// `None` when no chat API key is configured
    pub stories: Option<Arc<StoryGenerator>>,
    /// `None` when no speech API key is configured
    pub speech: Option<Arc<dyn SpeechProvider>>,
    /// Synthesized audio is written here and served under `/static`
    pub audio_dir: PathBuf,
}

impl AppState {
    pub fn new(app_name: impl Into<String>, conversation: Arc<Conversation>, audio_dir: PathBuf) -> Self {
        Self {
            app_name: app_name.into(),
            conversation,
            stories: None,
            speech: None,
            audio_dir,
        }
    }

    pub fn with_stories(mut self, stories: Arc<StoryGenerator>) -> Self {
        self.stories = Some(stories);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechProvider>) -> Self {
        self.speech = Some(speech);
        self
    }
}
