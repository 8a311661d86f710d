//! Race dispatcher: run every responder against the same query, keep the
//! first success, cancel the rest.
//!
//! Each responder runs in its own task inside a `JoinSet`. The dispatcher
//! waits on `join_next()` in completion order, so the first task to finish
//! successfully wins. Failures are reported through the outcome callback and
//! the race keeps going. Once a winner is found the race's cancellation token
//! fires, every task still in flight stops at its next await point, and the
//! set is aborted and dropped so no late result can reach the caller.

use crate::error::{RaceError, ResponderError, ResponderFailure};
use crate::responder::{Outcome, Query, Responder, Response};
use crate::retry;
use futures_util::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Configuration for a race.
#[derive(Debug, Clone)]
pub struct RaceOptions {
    /// Overall deadline for the race in milliseconds
    pub timeout_ms: u64,
    /// Upper bound on any single responder call in milliseconds
    pub responder_timeout_ms: u64,
    /// Maximum retries per responder for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for RaceOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 90_000,
            responder_timeout_ms: 60_000,
            retry_attempts: 1,
            retry_delay_ms: 500,
        }
    }
}

impl From<&crate::config::RaceConfig> for RaceOptions {
    fn from(config: &crate::config::RaceConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            responder_timeout_ms: config.responder_timeout_ms,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

/// The single success consumed from a race.
#[derive(Debug, Clone, Serialize)]
pub struct RaceWin {
    /// Name of the winning responder
    pub responder: String,
    /// The winner's reply
    pub response: Response,
    /// Wall-clock time from race start to the win
    pub elapsed_ms: u64,
}

/// What a responder task hands back to the dispatcher.
enum TaskResult {
    Finished(Result<Response, ResponderError>),
    Panicked(String),
    /// The race token fired before the call finished
    Cancelled,
}

/// Runs a set of interchangeable responders and returns the first success.
pub struct RaceDispatcher {
    responders: Vec<Arc<dyn Responder>>,
    options: RaceOptions,
    cancel: CancellationToken,
}

impl RaceDispatcher {
    pub fn new(responders: Vec<Arc<dyn Responder>>, options: RaceOptions) -> Self {
        Self {
            responders,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external token as the parent of every race's token.
    ///
    /// Cancelling it (e.g. on Ctrl-C) stops all in-flight responders.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Race all responders against `query`.
    pub async fn dispatch(&self, query: Query) -> Result<RaceWin, RaceError> {
        self.dispatch_with(query, |_| {}).await
    }

    /// Race all responders against `query`, reporting every observed outcome.
    ///
    /// `on_outcome` sees each failure as it arrives and the winning success.
    /// Results from responders that finish after the win are never reported.
    pub async fn dispatch_with<F>(&self, query: Query, on_outcome: F) -> Result<RaceWin, RaceError>
    where
        F: Fn(&Outcome),
    {
        if self.responders.is_empty() {
            return Err(RaceError::NoResponders);
        }

        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.options.timeout_ms);
        let token = self.cancel.child_token();

        tracing::info!("Racing {} responder(s)", self.responders.len());

        let mut join_set = JoinSet::new();
        for (idx, responder) in self.responders.iter().enumerate() {
            let responder = Arc::clone(responder);
            let query = query.clone();
            let options = self.options.clone();
            let token = token.clone();

            join_set.spawn(async move {
                let result = AssertUnwindSafe(run_responder(&responder, &query, &options, &token))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        TaskResult::Panicked(panic_message(payload.as_ref()))
                    });
                (idx, result)
            });
        }

        let mut pending = vec![true; self.responders.len()];
        let mut failures = Vec::new();

        loop {
            let next = tokio::time::timeout_at(deadline, join_set.join_next()).await;
            let (idx, result) = match next {
                Err(_) => {
                    token.cancel();
                    join_set.abort_all();
                    for (idx, still_pending) in pending.iter().enumerate() {
                        if *still_pending {
                            let name = self.responders[idx].name();
                            tracing::warn!(
                                "{name} still running at race deadline ({}ms)",
                                self.options.timeout_ms
                            );
                            failures.push(ResponderFailure::new(
                                name,
                                format!("timed out after {}ms", self.options.timeout_ms),
                            ));
                        }
                    }
                    return Err(RaceError::AllFailed {
                        failures,
                        timed_out: true,
                    });
                }
                Ok(None) => {
                    for (idx, still_pending) in pending.iter().enumerate() {
                        if *still_pending {
                            failures.push(ResponderFailure::new(
                                self.responders[idx].name(),
                                "task ended without a result",
                            ));
                        }
                    }
                    return Err(RaceError::AllFailed {
                        failures,
                        timed_out: false,
                    });
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("Responder task aborted: {e}");
                    continue;
                }
                Ok(Some(Ok(done))) => done,
            };

            pending[idx] = false;
            let name = self.responders[idx].name();

            let error = match result {
                TaskResult::Finished(Ok(response)) => {
                    token.cancel();
                    join_set.abort_all();

                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    tracing::info!(
                        "{name} won the race in {elapsed_ms}ms (model {}, {}ms latency)",
                        response.model,
                        response.latency_ms
                    );
                    on_outcome(&Outcome::Success {
                        responder: name.to_string(),
                        text: response.text.clone(),
                    });
                    return Ok(RaceWin {
                        responder: name.to_string(),
                        response,
                        elapsed_ms,
                    });
                }
                TaskResult::Finished(Err(e)) => e.to_string(),
                TaskResult::Panicked(msg) => format!("task panicked: {msg}"),
                TaskResult::Cancelled => {
                    // Only reachable when the parent token fired mid-race
                    tracing::debug!("{name} cancelled before finishing");
                    "cancelled".to_string()
                }
            };

            tracing::warn!("{name} failed: {error}");
            on_outcome(&Outcome::Failure {
                responder: name.to_string(),
                error: error.clone(),
            });
            failures.push(ResponderFailure::new(name, error));
        }
    }

    /// Check every responder's availability concurrently.
    ///
    /// Results come back in responder order.
    pub async fn probe(&self) -> Vec<(String, bool)> {
        let mut join_set = JoinSet::new();
        for (idx, responder) in self.responders.iter().enumerate() {
            let responder = Arc::clone(responder);
            join_set.spawn(async move { (idx, responder.is_available().await) });
        }

        let mut available = vec![false; self.responders.len()];
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((idx, ok)) => available[idx] = ok,
                Err(e) => tracing::error!("Availability check panicked: {e}"),
            }
        }

        self.responders
            .iter()
            .zip(available)
            .map(|(r, ok)| (r.name().to_string(), ok))
            .collect()
    }
}

/// Run one responder with retry, bounded by its call timeout and the race token.
async fn run_responder(
    responder: &Arc<dyn Responder>,
    query: &Query,
    options: &RaceOptions,
    token: &CancellationToken,
) -> TaskResult {
    let call_timeout = responder
        .timeout()
        .min(Duration::from_millis(options.responder_timeout_ms));
    let mut attempt = 0u32;

    loop {
        let call = tokio::time::timeout(call_timeout, responder.respond(query));
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return TaskResult::Cancelled,
            result = call => result,
        };

        let error = match result {
            Ok(Ok(response)) => return TaskResult::Finished(Ok(response)),
            Ok(Err(e)) => e,
            Err(_) => ResponderError::Timeout {
                responder: responder.name().to_string(),
                timeout_ms: call_timeout.as_millis() as u64,
            },
        };

        if attempt >= options.retry_attempts || !retry::is_retryable(&error) {
            return TaskResult::Finished(Err(error));
        }

        let delay = retry::jittered_backoff(attempt, options.retry_delay_ms);
        attempt += 1;
        tracing::debug!(
            "Retry {attempt}/{} for {} after {delay:?}: {error}",
            options.retry_attempts,
            responder.name()
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return TaskResult::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
