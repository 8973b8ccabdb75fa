//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    let assistant = &config.assistant;
    if assistant.persona.trim().is_empty() {
        errors.push("assistant.persona must not be empty".to_string());
    }
    if assistant.model.trim().is_empty() {
        errors.push("assistant.model must not be empty".to_string());
    }
    if assistant.context_window == 0 {
        errors.push("assistant.context_window must be >= 1".to_string());
    }
    if assistant.max_tokens == 0 {
        errors.push("assistant.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&assistant.temperature) {
        errors.push("assistant.temperature must be in [0.0, 2.0]".to_string());
    }
    if assistant.fallback_reply.trim().is_empty() {
        errors.push("assistant.fallback_reply must not be empty".to_string());
    }

    let intercept = &config.intercept;
    if intercept.enabled {
        if !intercept.timezone.eq_ignore_ascii_case("local")
            && intercept.timezone.parse::<chrono_tz::Tz>().is_err()
        {
            errors.push(format!(
                "intercept.timezone '{}' is neither 'local' nor a known IANA zone",
                intercept.timezone
            ));
        }
        if intercept.date_keywords.iter().all(|k| k.trim().is_empty()) {
            errors.push("intercept.date_keywords must contain at least one phrase".to_string());
        }
    }

    if config.providers.chat.timeout_secs == 0 {
        errors.push("providers.chat.timeout_secs must be > 0".to_string());
    }
    if config.providers.speech.timeout_secs == 0 {
        errors.push("providers.speech.timeout_secs must be > 0".to_string());
    }
    for (name, value) in [
        ("stability", config.providers.speech.stability),
        ("similarity_boost", config.providers.speech.similarity_boost),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(format!("providers.speech.{} must be in [0.0, 1.0]", name));
        }
    }

    if config.sessions.dir.trim().is_empty() {
        errors.push("sessions.dir must not be empty".to_string());
    }
    if config.sessions.idle_ttl_secs == Some(0) {
        errors.push("sessions.idle_ttl_secs must be > 0 when set".to_string());
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.server.audio_dir.trim().is_empty() {
        errors.push("server.audio_dir must not be empty".to_string());
    }

    if config.stories.max_tokens == 0 {
        errors.push("stories.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.stories.temperature) {
        errors.push("stories.temperature must be in [0.0, 2.0]".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.intercept.timezone = "Mars/Olympus".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("intercept.timezone"));
    }

    #[test]
    fn test_validate_accepts_named_timezone() {
        let mut config = Config::default();
        config.intercept.timezone = "Asia/Kolkata".to_string();
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.providers.chat.timeout_secs = 0;
        config.providers.speech.stability = 1.5;
        config.sessions.idle_ttl_secs = Some(0);

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("providers.chat.timeout_secs"));
        assert!(message.contains("providers.speech.stability"));
        assert!(message.contains("sessions.idle_ttl_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_context_window() {
        let mut config = Config::default();
        config.assistant.context_window = 0;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("assistant.context_window"));

        config.assistant.context_window = 1;
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_disabled_intercept_skips_keyword_check() {
        let mut config = Config::default();
        config.intercept.enabled = false;
        config.intercept.date_keywords.clear();
        validate_config(&config).unwrap();
    }
}
