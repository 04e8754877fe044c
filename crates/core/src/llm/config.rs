// crates/core/src/llm/config.rs
//! LLM provider configuration.

/// Model used when `LLM_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "mistralai/devstral-2512:free";

/// Endpoint used when `LLM_API_BASE` is not set.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Credentials and endpoint for the OpenAI-compatible text-completion API.
///
/// Shared by the exploration agent (forwarded to its process) and the UX
/// analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            api_base: DEFAULT_API_BASE.into(),
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    /// Read `API_KEY`, `LLM_MODEL` and `LLM_API_BASE`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmSettings::from_env`] with an injectable lookup, for tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: non_empty("API_KEY"),
            model: non_empty("LLM_MODEL").unwrap_or(defaults.model),
            api_base: non_empty("LLM_API_BASE").unwrap_or(defaults.api_base),
            timeout_secs: non_empty("LLM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let settings = LlmSettings::from_lookup(|_| None);
        assert_eq!(settings, LlmSettings::default());
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_reads_overrides_and_ignores_blank() {
        let env: HashMap<&str, &str> = [
            ("API_KEY", "sk-test"),
            ("LLM_MODEL", "  "),
            ("LLM_API_BASE", "http://localhost:8080/v1"),
            ("LLM_TIMEOUT_SECS", "15"),
        ]
        .into_iter()
        .collect();
        let settings = LlmSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.api_base, "http://localhost:8080/v1");
        assert_eq!(settings.timeout_secs, 15);
    }
}
