//! Context builder for assembling prompts

use suno_core::session::{ChatMessage, Role};
use suno_providers::Message;

/// Builds the message list sent to the chat provider
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
    window: usize,
}

impl ContextBuilder {
    /// `window` is the number of stored messages included after the persona;
    /// config validation keeps it at 1 or more
    pub fn new(persona: impl Into<String>, window: usize) -> Self {
        Self {
            persona: persona.into(),
            window,
        }
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Build the complete message list for an LLM call.
    ///
    /// The persona always comes first and is never read from history. Only
    /// the last `window` entries of `history` follow, in their original order.
    pub fn build_messages(&self, history: &[ChatMessage]) -> Vec<Message> {
        let start = history.len().saturating_sub(self.window);
        let mut messages = Vec::with_capacity(self.window.min(history.len()) + 1);
        messages.push(Message::system(self.persona.clone()));

        for msg in &history[start..] {
            // A stored system line would duplicate the persona
            if msg.role == Role::System {
                continue;
            }
            messages.push(Message::from(msg));
        }

        messages
    }
}
