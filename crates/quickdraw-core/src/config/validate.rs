//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.race.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "race.timeout_ms must be > 0".into(),
            ));
        }
        if self.race.responder_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "race.responder_timeout_ms must be > 0".into(),
            ));
        }
        if self.extract_table.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "extract_table.timeout_ms must be > 0".into(),
            ));
        }
        if self.extract_table.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "extract_table.poll_interval_ms must be > 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for responder in &self.responders {
            if responder.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "responders.name must not be empty".into(),
                ));
            }
            if !seen.insert(responder.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate responder name '{}'",
                    responder.name
                )));
            }
            if !(0.0..=2.0).contains(&responder.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "responders.{}.temperature must be between 0.0 and 2.0",
                    responder.name
                )));
            }
            if responder.timeout_ms == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "responders.{}.timeout_ms must be > 0",
                    responder.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResponderConfig, ResponderKind};

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_race_timeout() {
        let mut config = Config::default();
        config.race.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("race.timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.extract_table.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = Config::default();
        config
            .responders
            .push(ResponderConfig::new("ollama", ResponderKind::Openai));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate responder name 'ollama'"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut config = Config::default();
        config
            .responders
            .push(ResponderConfig::new("  ", ResponderKind::Ollama));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("name must not be empty"));
    }

    #[test]
    fn test_validate_rejects_invalid_temperature() {
        let mut config = Config::default();
        config.responders[0].temperature = 2.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));

        config.responders[0].temperature = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_responder_timeout() {
        let mut config = Config::default();
        config.responders[1].timeout_ms = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("responders.openai.timeout_ms"));
    }
}
