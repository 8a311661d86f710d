//! CLI command implementations.

pub mod ask;
pub mod config;
pub mod extract;
pub mod probe;
pub mod usage;

use anyhow::Context;
use clap::ValueEnum;
use quickdraw_core::{Config, OutputFormat, RaceOptions};
use std::path::Path;

/// Supported output formats.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormatArg {
    /// The winning reply labelled by its source
    #[default]
    Text,
    /// Full race report as JSON
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

impl std::fmt::Display for OutputFormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormatArg::Text => write!(f, "text"),
            OutputFormatArg::Json => write!(f, "json"),
        }
    }
}

/// Load configuration for this invocation.
///
/// An explicit `--config` file that exists must parse; a missing one falls
/// back to defaults so `config init` can create it. Problems with the
/// default location only warn. Logging isn't initialized yet, so warnings
/// go straight to stderr.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Ok(Config::default());
        }
        return Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `quickdraw config path`."
            );
            Ok(Config::default())
        }
    }
}

/// Race options from config, with an optional `--timeout` override.
pub fn race_options(config: &Config, timeout_ms: Option<u64>) -> anyhow::Result<RaceOptions> {
    let mut options = RaceOptions::from(&config.race);
    if let Some(ms) = timeout_ms {
        if ms == 0 {
            anyhow::bail!("--timeout must be greater than 0");
        }
        options.timeout_ms = ms;
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.race.timeout_ms, 90_000);
    }

    #[test]
    fn explicit_invalid_config_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[race]\ntimeout_ms = 0").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("timeout_ms"));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[race]\ntimeout_ms = 1234").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.race.timeout_ms, 1234);
    }

    #[test]
    fn timeout_override() {
        let config = Config::default();
        assert_eq!(race_options(&config, None).unwrap().timeout_ms, 90_000);
        assert_eq!(race_options(&config, Some(250)).unwrap().timeout_ms, 250);
        assert!(race_options(&config, Some(0)).is_err());
    }

    #[test]
    fn format_arg_maps_to_core() {
        assert_eq!(OutputFormat::from(OutputFormatArg::Json), OutputFormat::Json);
        assert_eq!(OutputFormatArg::Text.to_string(), "text");
    }
}
