//! OpenAI-compatible responder using the Chat Completions API.
//!
//! One instance per configured provider: OpenAI itself, Groq, OpenRouter,
//! free-tier gateways, anything that speaks `/chat/completions`. Racing a
//! list of these is the multi-provider aggregator.

use super::{http_error, request_error, Query, Responder, Response};
use crate::error::ResponderError;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Chat Completions responder for any OpenAI-compatible endpoint.
pub struct ChatCompletionsResponder {
    name: String,
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl ChatCompletionsResponder {
    /// Create a responder for the API rooted at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            name: name.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens: 512,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, query: &Query, stream: bool) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
            messages: vec![ChatMessage {
                role: "user",
                content: query.as_str(),
            }],
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Stream a completion, calling `on_delta` with each text fragment as it arrives.
    ///
    /// Returns the full concatenated reply once the server sends `[DONE]`
    /// or closes the stream.
    pub async fn stream_chat<F>(
        &self,
        query: &Query,
        mut on_delta: F,
    ) -> Result<Response, ResponderError>
    where
        F: FnMut(&str),
    {
        let start = Instant::now();
        let resp = self
            .request(query, true)
            .send()
            .await
            .map_err(|e| request_error(&self.name, self.timeout, e))?;

        if !resp.status().is_success() {
            return Err(http_error(&self.name, resp).await);
        }

        let mut stream = resp.bytes_stream();
        // Raw bytes: a multi-byte character may straddle two chunks
        let mut buffer: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut model = None;
        let mut done = false;

        while !done {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let chunk = chunk.map_err(|e| request_error(&self.name, self.timeout, e))?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let event = parse_sse_line(&String::from_utf8_lossy(&line))?;
                if apply_sse_line(event, &mut text, &mut model, &mut on_delta) {
                    done = true;
                    break;
                }
            }
        }
        if !done && !buffer.is_empty() {
            let event = parse_sse_line(&String::from_utf8_lossy(&buffer))?;
            apply_sse_line(event, &mut text, &mut model, &mut on_delta);
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ResponderError::Parse {
                message: format!("{} stream ended without any content", self.name),
            });
        }

        Ok(Response {
            text,
            model: model.unwrap_or_else(|| self.model.clone()),
            tokens_used: None,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// One decoded server-sent-event line of a streamed completion.
#[derive(Debug, PartialEq)]
enum SseLine {
    Delta {
        content: Option<String>,
        model: Option<String>,
    },
    Done,
    /// Blank keep-alives, comments and non-data fields
    Ignored,
}

/// Fold one event into the accumulated reply. Returns true on `[DONE]`.
fn apply_sse_line<F: FnMut(&str)>(
    event: SseLine,
    text: &mut String,
    model: &mut Option<String>,
    on_delta: &mut F,
) -> bool {
    match event {
        SseLine::Done => return true,
        SseLine::Delta {
            content,
            model: chunk_model,
        } => {
            if model.is_none() {
                *model = chunk_model;
            }
            if let Some(content) = content {
                on_delta(&content);
                text.push_str(&content);
            }
        }
        SseLine::Ignored => {}
    }
    false
}

fn parse_sse_line(line: &str) -> Result<SseLine, ResponderError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignored);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Ignored);
    }

    let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| ResponderError::Parse {
        message: format!("Malformed stream chunk: {e}"),
    })?;
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());
    Ok(SseLine::Delta {
        content,
        model: chunk.model,
    })
}

#[async_trait]
impl Responder for ChatCompletionsResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        let mut builder = self
            .client
            .get(format!("{}/models", self.base_url))
            .timeout(Duration::from_secs(5));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        matches!(builder.send().await, Ok(resp) if resp.status().is_success())
    }

    async fn respond(&self, query: &Query) -> Result<Response, ResponderError> {
        let start = Instant::now();

        let resp = self
            .request(query, false)
            .send()
            .await
            .map_err(|e| request_error(&self.name, self.timeout, e))?;

        if !resp.status().is_success() {
            return Err(http_error(&self.name, resp).await);
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| ResponderError::Parse {
            message: format!("Failed to parse {} response: {e}", self.name),
        })?;

        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ResponderError::Parse {
                message: format!(
                    "{} returned empty choices array, no content generated",
                    self.name
                ),
            })?;

        Ok(Response {
            text,
            model: chat_resp.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: chat_resp.usage.map(|u| u.total_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
