//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

/// Race timing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Overall deadline for a race in milliseconds
    pub timeout_ms: u64,

    /// Upper bound for any single responder call in milliseconds
    pub responder_timeout_ms: u64,

    /// Max retry attempts per responder for transient failures
    pub retry_attempts: u32,

    /// Base delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 90_000,
            responder_timeout_ms: 60_000,
            retry_attempts: 1,
            retry_delay_ms: 500,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Backend protocol spoken by a chat responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    /// Local Ollama instance
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    Openai,
    /// Anthropic Messages API
    Anthropic,
}

impl ResponderKind {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Openai => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => "llama3.2",
            Self::Openai => "gpt-4o-mini",
            Self::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    /// Whether calls are rejected without an API key.
    ///
    /// OpenAI-compatible endpoints are allowed to run keyless since many
    /// free-tier gateways accept anonymous requests.
    pub fn requires_api_key(self) -> bool {
        matches!(self, Self::Anthropic)
    }
}

impl std::fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Openai => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f32 {
    0.7
}

/// One chat responder entry (`[[responders]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Unique responder id, used as the label in output
    pub name: String,

    /// Backend protocol
    pub kind: ResponderKind,

    /// Disabled entries are never raced
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API base URL; falls back to the kind's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key (supports ${ENV_VAR} syntax)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name; falls back to the kind's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ResponderConfig {
    /// A minimal entry using the kind's default endpoint and model.
    pub fn new(name: &str, kind: ResponderKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            endpoint: None,
            api_key: None,
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }
}

/// Default responder set: a local model plus two hosted providers.
pub(crate) fn default_responders() -> Vec<ResponderConfig> {
    let ollama = ResponderConfig::new("ollama", ResponderKind::Ollama);

    let mut openai = ResponderConfig::new("openai", ResponderKind::Openai);
    openai.api_key = Some("${OPENAI_API_KEY}".to_string());

    let mut anthropic = ResponderConfig::new("anthropic", ResponderKind::Anthropic);
    anthropic.api_key = Some("${ANTHROPIC_API_KEY}".to_string());

    vec![ollama, openai, anthropic]
}

/// Table-extraction API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractTableConfig {
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Upload endpoint that starts an extraction job
    pub trigger_endpoint: String,

    /// Endpoint polled for jobs still processing
    pub result_endpoint: String,

    /// Endpoint reporting key validity and credit usage
    pub validator_endpoint: String,

    /// PDF pages to process ("1", "1,3-4", "all")
    pub pages: String,

    /// Delay between result polls in milliseconds
    pub poll_interval_ms: u64,

    /// Timeout for the whole extraction in milliseconds
    pub timeout_ms: u64,
}

impl Default for ExtractTableConfig {
    fn default() -> Self {
        Self {
            api_key: "${EXTRACT_TABLE_API_KEY}".to_string(),
            trigger_endpoint: "https://trigger.extracttable.com".to_string(),
            result_endpoint: "https://getresult.extracttable.com".to_string(),
            validator_endpoint: "https://validator.extracttable.com".to_string(),
            pages: "all".to_string(),
            poll_interval_ms: 2000,
            timeout_ms: 120_000,
        }
    }
}
