// src/utils/config.rs
use crate::insight::PromptLanguage;
use crate::utils::error::AppError;

pub const DEFAULT_JQUANTS_API_BASE: &str = "https://api.jquants.com/v1";
pub const DEFAULT_EDINET_API_BASE: &str = "https://disclosure.edinet-fsa.go.jp/api/v1";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Whatever the J-Quants token chain can start from.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub mail_address: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jquants_api_base: String,
    pub edinet_api_base: String,
    pub credentials: Credentials,
    pub openai_api_base: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
    pub insight_language: PromptLanguage,
    /// Pause before each J-Quants request; the client default applies when unset.
    pub request_delay_ms: Option<u64>,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let credentials = Credentials {
            mail_address: get(&["JQUANTS_ID", "QUANTS_ID"]),
            password: get(&["JQUANTS_PASSWORD", "PASSWORD"]),
            refresh_token: get(&["REFRESH_TOKEN"]),
            id_token: get(&["JQUANTS_ID_TOKEN"]),
        };

        let insight_language = match get(&["INSIGHT_LANGUAGE"]) {
            Some(raw) => PromptLanguage::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown INSIGHT_LANGUAGE {:?}; using Japanese", raw);
                PromptLanguage::default()
            }),
            None => PromptLanguage::default(),
        };

        Self {
            jquants_api_base: get(&["JQUANTS_API_BASE"])
                .unwrap_or_else(|| DEFAULT_JQUANTS_API_BASE.to_string()),
            edinet_api_base: get(&["EDINET_API_BASE"])
                .unwrap_or_else(|| DEFAULT_EDINET_API_BASE.to_string()),
            credentials,
            openai_api_base: get(&["OPENAI_API_BASE"])
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            openai_model: get(&["OPENAI_MODEL"])
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_key: get(&["GPT_TOKEN", "OPENAI_API_KEY"]),
            insight_language,
            request_delay_ms: get(&["JQUANTS_REQUEST_DELAY_MS"]).and_then(|v| v.parse().ok()),
        }
    }

    pub fn require_openai_key(&self) -> Result<&str, AppError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("GPT_TOKEN (or OPENAI_API_KEY) is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.jquants_api_base, DEFAULT_JQUANTS_API_BASE);
        assert_eq!(config.edinet_api_base, DEFAULT_EDINET_API_BASE);
        assert_eq!(config.openai_model, DEFAULT_OPENAI_MODEL);
        assert!(config.credentials.refresh_token.is_none());
        assert!(config.require_openai_key().is_err());
        assert!(config.request_delay_ms.is_none());
        assert_eq!(config.insight_language, PromptLanguage::Japanese);
    }

    #[test]
    fn test_fallback_keys_and_blank_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("JQUANTS_ID", "  "),
            ("QUANTS_ID", "user@example.com"),
            ("PASSWORD", "secret"),
            ("OPENAI_API_KEY", "sk-test"),
        ]));
        assert_eq!(config.credentials.mail_address.as_deref(), Some("user@example.com"));
        assert_eq!(config.credentials.password.as_deref(), Some("secret"));
        assert_eq!(config.require_openai_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_unknown_language_falls_back_to_japanese() {
        let config = AppConfig::from_lookup(lookup_from(&[("INSIGHT_LANGUAGE", "klingon")]));
        assert_eq!(config.insight_language, PromptLanguage::Japanese);
    }

    #[test]
    fn test_primary_key_wins() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GPT_TOKEN", "gpt"),
            ("OPENAI_API_KEY", "openai"),
            ("JQUANTS_API_BASE", "http://localhost:9000"),
            ("JQUANTS_REQUEST_DELAY_MS", "50"),
            ("INSIGHT_LANGUAGE", "en"),
        ]));
        assert_eq!(config.insight_language, PromptLanguage::English);
        assert_eq!(config.request_delay_ms, Some(50));
        assert_eq!(config.openai_api_key.as_deref(), Some("gpt"));
        assert_eq!(config.jquants_api_base, "http://localhost:9000");
    }
}
