//! Provider registry - metadata for known OpenAI-compatible endpoints

use serde::{Deserialize, Serialize};

/// One provider's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub display_name: String,
    pub env_key: String,
    pub default_api_base: String,
    pub default_model: String,
    #[serde(default)]
    pub detect_by_key_prefix: String,
    #[serde(default)]
    pub detect_by_base_keyword: String,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

/// Registry of available chat-completion providers
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Create a new provider registry with the built-in providers
    pub fn new() -> Self {
        Self {
            providers: Self::default_providers(),
        }
    }

    /// Get all provider specs
    pub fn all(&self) -> &[ProviderSpec] {
        &self.providers
    }

    /// Find a provider by config name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Guess the provider from an API key prefix or an API base URL
    pub fn detect(&self, api_key: Option<&str>, api_base: Option<&str>) -> Option<&ProviderSpec> {
        for spec in &self.providers {
            if let Some(key) = api_key {
                if !spec.detect_by_key_prefix.is_empty() && key.starts_with(&spec.detect_by_key_prefix)
                {
                    return Some(spec);
                }
            }
            if let Some(base) = api_base {
                if !spec.detect_by_base_keyword.is_empty()
                    && base.contains(&spec.detect_by_base_keyword)
                {
                    return Some(spec);
                }
            }
        }
        None
    }

    /// Pick the endpoint for a client: an explicit base wins, then the named
    /// provider, then whatever the key prefix suggests
    pub fn resolve(
        &self,
        provider_name: Option<&str>,
        api_key: Option<&str>,
        api_base: Option<&str>,
    ) -> Option<&ProviderSpec> {
        let api_base = api_base.filter(|b| !b.trim().is_empty());
        if let Some(spec) = api_base.and_then(|base| self.detect(None, Some(base))) {
            return Some(spec);
        }
        provider_name
            .and_then(|name| self.find_by_name(name))
            .or_else(|| self.detect(api_key, None))
    }

    fn default_providers() -> Vec<ProviderSpec> {
        let yaml = include_str!("providers.yaml");
        serde_yaml::from_str(yaml).expect("Failed to parse built-in providers.yaml")
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_parses() {
        let registry = ProviderRegistry::new();
        assert!(registry.all().len() >= 5);
        assert!(registry.all().iter().all(|s| !s.default_api_base.is_empty()));
    }

    #[test]
    fn test_find_by_name() {
        let registry = ProviderRegistry::new();
        let spec = registry.find_by_name("Groq").unwrap();
        assert_eq!(spec.default_api_base, "https://api.groq.com/openai/v1");
        assert_eq!(spec.default_model, "llama3-8b-8192");
        assert!(registry.find_by_name("nope").is_none());
    }

    #[test]
    fn test_detect_by_key_prefix() {
        let registry = ProviderRegistry::new();
        assert_eq!(
            registry.detect(Some("gsk_abc"), None).unwrap().name,
            "groq"
        );
        assert_eq!(
            registry.detect(Some("sk-or-v1-abc"), None).unwrap().name,
            "openrouter"
        );
        assert!(registry.detect(Some("sk-plain"), None).is_none());
    }

    #[test]
    fn test_resolve_prefers_explicit_base() {
        let registry = ProviderRegistry::new();
        let spec = registry
            .resolve(Some("groq"), None, Some("http://localhost:11434/v1"))
            .unwrap();
        assert!(spec.is_local);

        let spec = registry.resolve(Some("openai"), Some("gsk_x"), None).unwrap();
        assert_eq!(spec.name, "openai");

        let spec = registry.resolve(None, Some("gsk_x"), Some("")).unwrap();
        assert_eq!(spec.name, "groq");
    }
}
