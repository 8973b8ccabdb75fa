//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for suno
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Conversational assistant settings
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Local intercept rules
    #[serde(default)]
    pub intercept: InterceptConfig,
    /// Remote provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Session storage configuration
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Story generation defaults
    #[serde(default)]
    pub stories: StoriesConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Days to keep rotated log files
    #[serde(default = "default_log_retention")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_retention() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            retention_days: default_log_retention(),
            overrides: HashMap::new(),
        }
    }
}

pub const DEFAULT_PERSONA: &str = "You are SunoAi, a helpful AI assistant. You were created by Sohail. \
Always respond kindly and if someone asks 'who made you', say 'I was created by Sohail'.";

pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, I couldn't connect to the AI service.";

/// Assistant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Display name
    pub name: String,
    /// System message prepended to every context window
    pub persona: String,
    /// Model identifier sent to the chat provider
    pub model: String,
    /// Maximum completion tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Number of most recent history messages sent as context
    pub context_window: usize,
    /// Reply returned whenever the provider cannot answer
    pub fallback_reply: String,
    /// Whether locally answered turns are written to history
    pub record_intercepted: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "SunoAi".to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            model: "llama3-8b-8192".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            context_window: 5,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            record_intercepted: true,
        }
    }
}

/// Local intercept rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Answer date questions locally
    pub enabled: bool,
    /// `local` or an IANA zone name such as `Asia/Kolkata`
    pub timezone: String,
    /// Lower-case phrases that mark a "what is today's date" question
    pub date_keywords: Vec<String>,
}

pub fn default_date_keywords() -> Vec<String> {
    [
        // English
        "what day today",
        "what day is today",
        "what day is it",
        "what is today's date",
        "what's today's date",
        "what is the date today",
        "what's the date",
        "what date is it",
        "today's date",
        "todays date",
        // Hindi (romanized)
        "aaj ka din",
        "aaj kya din hai",
        "aaj ki date",
        "aaj ki tarikh",
        "aaj ki tareekh",
        "aaj kaun sa din",
        "aaj konsa din",
        // Hindi (Devanagari)
        "आज का दिन",
        "आज क्या दिन है",
        "आज की तारीख",
        "आज कौन सा दिन",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "local".to_string(),
            date_keywords: default_date_keywords(),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub chat: ChatProviderConfig,
    #[serde(default)]
    pub speech: SpeechProviderConfig,
}

/// Chat-completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatProviderConfig {
    /// Registry name (groq, openai, openrouter, deepseek, ollama)
    pub provider: String,
    pub api_key: String,
    /// Overrides the registry's default endpoint when non-empty
    pub api_base: String,
    /// Upper bound for one completion call
    pub timeout_secs: u64,
    pub extra_headers: HashMap<String, String>,
}

impl Default for ChatProviderConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            api_key: String::new(),
            api_base: String::new(),
            timeout_secs: 10,
            extra_headers: HashMap::new(),
        }
    }
}

impl ChatProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Text-to-speech provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechProviderConfig {
    pub api_key: String,
    pub api_base: String,
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub timeout_secs: u64,
}

impl Default for SpeechProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.elevenlabs.io/v1".to_string(),
            voice_id: "LQqGm0gT4pft0DECaryn".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout_secs: 30,
        }
    }
}

impl SpeechProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Where session histories live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackendKind {
    /// Process lifetime only
    #[default]
    Memory,
    /// One JSONL file per session
    Jsonl,
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub backend: SessionBackendKind,
    /// Directory for the JSONL backend
    pub dir: String,
    /// Drop sessions idle for longer than this from memory
    pub idle_ttl_secs: Option<u64>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackendKind::Memory,
            dir: "~/.suno/sessions".to_string(),
            idle_ttl_secs: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    /// Directory where synthesized audio is written and served from `/static`
    pub audio_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: "SunoAI".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            audio_dir: "static".to_string(),
        }
    }
}

/// Story generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoriesConfig {
    /// Falls back to `assistant.model` when unset
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for StoriesConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}
