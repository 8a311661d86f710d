//! Builds responders from configuration.

use super::{
    AnthropicResponder, ChatCompletionsResponder, ExtractTableResponder, OllamaResponder,
    Responder,
};
use crate::config::{Config, ResponderConfig, ResponderKind};
use crate::error::ConfigError;
use std::sync::Arc;
use std::time::Duration;

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Name of the env var referenced by a `${VAR}` value, for error hints.
fn env_var_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

/// Factory that creates responders from the config file.
pub struct ResponderFactory;

impl ResponderFactory {
    /// Build the chat responder set raced for a query.
    ///
    /// Disabled entries are skipped. Entries whose required API key cannot be
    /// resolved are skipped with a warning, so one missing key never blocks
    /// the rest of the race. `only` restricts the set to the named entries;
    /// naming an entry that doesn't exist is an error.
    pub fn from_config(
        config: &Config,
        only: &[String],
    ) -> Result<Vec<Arc<dyn Responder>>, ConfigError> {
        for name in only {
            if config.responder(name).is_none() {
                return Err(ConfigError::UnknownResponder(name.clone()));
            }
        }

        let mut responders: Vec<Arc<dyn Responder>> = Vec::new();
        for entry in &config.responders {
            let selected = if only.is_empty() {
                entry.enabled
            } else {
                // Naming a disabled responder explicitly runs it anyway
                only.iter().any(|n| n == &entry.name)
            };
            if !selected {
                continue;
            }

            match Self::create(entry) {
                Ok(responder) => responders.push(responder),
                Err(e) if only.is_empty() => {
                    tracing::warn!("Skipping responder '{}': {e}", entry.name);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            "Built {} responder(s): {}",
            responders.len(),
            responders
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(responders)
    }

    /// Create a single chat responder from its config entry.
    pub fn create(entry: &ResponderConfig) -> Result<Arc<dyn Responder>, ConfigError> {
        let api_key = entry.api_key.as_deref().and_then(resolve_env_var);
        if api_key.is_none() && entry.kind.requires_api_key() {
            return Err(ConfigError::MissingApiKey {
                responder: entry.name.clone(),
                env: entry
                    .api_key
                    .as_deref()
                    .and_then(env_var_name)
                    .unwrap_or("api_key")
                    .to_string(),
            });
        }

        let timeout = entry.timeout_ms.map(Duration::from_millis);

        let responder: Arc<dyn Responder> = match entry.kind {
            ResponderKind::Ollama => {
                let mut r = OllamaResponder::new(&entry.name, entry.endpoint(), entry.model())
                    .with_sampling(entry.max_tokens, entry.temperature);
                if let Some(t) = timeout {
                    r = r.with_timeout(t);
                }
                Arc::new(r)
            }
            ResponderKind::Openai => {
                let mut r = ChatCompletionsResponder::new(
                    &entry.name,
                    entry.endpoint(),
                    api_key.as_deref(),
                    entry.model(),
                )
                .with_sampling(entry.max_tokens, entry.temperature);
                if let Some(t) = timeout {
                    r = r.with_timeout(t);
                }
                Arc::new(r)
            }
            ResponderKind::Anthropic => {
                let key = api_key.unwrap_or_default();
                let mut r = AnthropicResponder::with_endpoint(
                    &entry.name,
                    &key,
                    entry.model(),
                    entry.endpoint(),
                )
                .with_sampling(entry.max_tokens, entry.temperature);
                if let Some(t) = timeout {
                    r = r.with_timeout(t);
                }
                Arc::new(r)
            }
        };
        Ok(responder)
    }

    /// Create a keyless-capable OpenAI-compatible responder for streaming.
    ///
    /// Streaming needs the concrete type, so this bypasses the trait object.
    pub fn chat_completions(
        entry: &ResponderConfig,
    ) -> Result<ChatCompletionsResponder, ConfigError> {
        if entry.kind != ResponderKind::Openai {
            return Err(ConfigError::ValidationError(format!(
                "responder '{}' is {}, streaming needs an openai-compatible responder",
                entry.name, entry.kind
            )));
        }
        let api_key = entry.api_key.as_deref().and_then(resolve_env_var);
        let mut r = ChatCompletionsResponder::new(
            &entry.name,
            entry.endpoint(),
            api_key.as_deref(),
            entry.model(),
        )
        .with_sampling(entry.max_tokens, entry.temperature);
        if let Some(ms) = entry.timeout_ms {
            r = r.with_timeout(Duration::from_millis(ms));
        }
        Ok(r)
    }

    /// Create the table-extraction responder.
    pub fn extract_table(config: &Config) -> Result<ExtractTableResponder, ConfigError> {
        let cfg = &config.extract_table;
        let api_key = resolve_env_var(&cfg.api_key).ok_or_else(|| ConfigError::MissingApiKey {
            responder: "extract_table".to_string(),
            env: env_var_name(&cfg.api_key)
                .unwrap_or("EXTRACT_TABLE_API_KEY")
                .to_string(),
        })?;
        Ok(ExtractTableResponder::new(cfg, &api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(entries: Vec<ResponderConfig>) -> Config {
        Config {
            responders: entries,
            ..Config::default()
        }
    }

    fn names(responders: &[Arc<dyn Responder>]) -> Vec<&str> {
        responders.iter().map(|r| r.name()).collect()
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("${OPENAI_API_KEY}"), Some("OPENAI_API_KEY"));
        assert_eq!(env_var_name("literal"), None);
    }

    #[test]
    fn test_builds_all_enabled_entries() {
        let mut disabled = ResponderConfig::new("off", ResponderKind::Ollama);
        disabled.enabled = false;
        let config = config_with(vec![
            ResponderConfig::new("local", ResponderKind::Ollama),
            ResponderConfig::new("free", ResponderKind::Openai),
            disabled,
        ]);
        let responders = ResponderFactory::from_config(&config, &[]).unwrap();
        assert_eq!(names(&responders), vec!["local", "free"]);
    }

    #[test]
    fn test_missing_required_key_is_skipped() {
        let mut claude = ResponderConfig::new("claude", ResponderKind::Anthropic);
        claude.api_key = Some("${QUICKDRAW_TEST_UNSET_KEY_9F2}".to_string());
        let config = config_with(vec![
            claude,
            ResponderConfig::new("local", ResponderKind::Ollama),
        ]);
        let responders = ResponderFactory::from_config(&config, &[]).unwrap();
        assert_eq!(names(&responders), vec!["local"]);
    }

    #[test]
    fn test_only_selects_named_entries() {
        let mut disabled = ResponderConfig::new("off", ResponderKind::Ollama);
        disabled.enabled = false;
        let config = config_with(vec![
            ResponderConfig::new("local", ResponderKind::Ollama),
            ResponderConfig::new("free", ResponderKind::Openai),
            disabled,
        ]);
        let only = vec!["free".to_string(), "off".to_string()];
        let responders = ResponderFactory::from_config(&config, &only).unwrap();
        assert_eq!(names(&responders), vec!["free", "off"]);
    }

    #[test]
    fn test_only_unknown_name_is_error() {
        let config = config_with(vec![ResponderConfig::new("local", ResponderKind::Ollama)]);
        let Err(err) = ResponderFactory::from_config(&config, &["nope".to_string()]) else {
            panic!("Expected an unknown responder error");
        };
        assert!(matches!(err, ConfigError::UnknownResponder(n) if n == "nope"));
    }

    #[test]
    fn test_only_with_missing_key_is_error() {
        let mut claude = ResponderConfig::new("claude", ResponderKind::Anthropic);
        claude.api_key = Some("${QUICKDRAW_TEST_UNSET_KEY_9F2}".to_string());
        let config = config_with(vec![claude]);
        let Err(err) = ResponderFactory::from_config(&config, &["claude".to_string()]) else {
            panic!("Expected a missing key error");
        };
        assert!(err.to_string().contains("QUICKDRAW_TEST_UNSET_KEY_9F2"));
    }

    #[test]
    fn test_empty_config_builds_empty_set() {
        let config = config_with(vec![]);
        let responders = ResponderFactory::from_config(&config, &[]).unwrap();
        assert!(responders.is_empty());
    }

    #[test]
    fn test_entry_timeout_override() {
        let mut entry = ResponderConfig::new("local", ResponderKind::Ollama);
        entry.timeout_ms = Some(1500);
        let responder = ResponderFactory::create(&entry).unwrap();
        assert_eq!(responder.timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_streaming_requires_openai_kind() {
        let entry = ResponderConfig::new("local", ResponderKind::Ollama);
        assert!(ResponderFactory::chat_completions(&entry).is_err());
        let entry = ResponderConfig::new("free", ResponderKind::Openai);
        assert!(ResponderFactory::chat_completions(&entry).is_ok());
    }

    #[test]
    fn test_extract_table_literal_key() {
        let mut config = Config::default();
        config.extract_table.api_key = "literal-key".to_string();
        assert!(ResponderFactory::extract_table(&config).is_ok());

        config.extract_table.api_key = "${QUICKDRAW_TEST_UNSET_KEY_9F2}".to_string();
        let Err(err) = ResponderFactory::extract_table(&config) else {
            panic!("Expected a missing key error");
        };
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    }
}
