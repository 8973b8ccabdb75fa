//! Provider integrations for the SunoAI backend
//!
//! Chat completion against OpenAI-compatible endpoints and text-to-speech.

pub mod base;
pub mod openai_compat;
pub mod registry;
pub mod speech;

pub use base::{
    FailureKind, LLMProvider, LLMResponse, Message, ProviderError, ProviderResult,
};
pub use openai_compat::OpenAICompatClient;
pub use registry::{ProviderRegistry, ProviderSpec};
pub use speech::{ElevenLabsClient, SpeechError, SpeechProvider};
