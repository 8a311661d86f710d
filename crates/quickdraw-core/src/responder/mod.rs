//! Responders: interchangeable backends that turn a query into text.
//!
//! Every backend (local Ollama, OpenAI-compatible gateways, Anthropic, the
//! table-extraction API) implements [`Responder`], so the race dispatcher
//! never depends on backend-specific types.

pub(crate) mod anthropic;
pub(crate) mod extract_table;
pub(crate) mod factory;
pub(crate) mod ollama;
pub(crate) mod openai;

pub use anthropic::AnthropicResponder;
pub use extract_table::{ExtractTableResponder, Usage};
pub use factory::{resolve_env_var, ResponderFactory};
pub use ollama::OllamaResponder;
pub use openai::ChatCompletionsResponder;

use crate::error::ResponderError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The caller's query, shared read-only across every concurrent responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(Arc<str>);

impl Query {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful responder reply.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Generated text
    pub text: String,
    /// Model identifier reported by the backend
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Result of one responder's participation in a race.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success { responder: String, text: String },
    Failure { responder: String, error: String },
}

/// Trait that all responders implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the dispatcher holds `Arc<dyn Responder>`).
#[async_trait]
pub trait Responder: Send + Sync {
    /// Responder id for logging and output labels (e.g. "ollama", "groq").
    fn name(&self) -> &str;

    /// Check whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;

    /// Produce a reply for the query.
    async fn respond(&self, query: &Query) -> Result<Response, ResponderError>;

    /// Per-call timeout for this responder.
    fn timeout(&self) -> Duration;
}

/// Read the body of a non-success HTTP response into a `ResponderError`.
pub(crate) async fn http_error(label: &str, resp: reqwest::Response) -> ResponderError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    ResponderError::Http {
        message: format!("{label} HTTP {status}: {}", text.trim()),
        status_code: Some(status.as_u16()),
    }
}

/// Map a transport-level reqwest failure into a `ResponderError`.
///
/// reqwest's `Display` hides the cause, so timeouts and connect failures are
/// told apart with its predicates and the source chain is kept in the message.
pub(crate) fn request_error(label: &str, timeout: Duration, err: reqwest::Error) -> ResponderError {
    if err.is_timeout() {
        return ResponderError::Timeout {
            responder: label.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
    }

    let mut message = format!("{label} request failed: {err}");
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    if err.is_connect() {
        ResponderError::Connect { message }
    } else {
        ResponderError::Http {
            message,
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}
