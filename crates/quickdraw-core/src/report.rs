//! Race reports for text and JSON output.
//!
//! A report captures everything a caller may want to print about one race:
//! the winner (if any) and every failure observed before the race ended.

use crate::error::{RaceError, ResponderFailure};
use crate::race::RaceWin;
use crate::responder::Outcome;
use serde::Serialize;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `[name] text` lines for humans
    #[default]
    Text,
    /// Single serialized report
    Json,
}

/// The winning reply inside a report.
#[derive(Debug, Clone, Serialize)]
pub struct WinnerReport {
    pub responder: String,
    pub text: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
}

/// Serializable summary of one race.
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    pub query: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerReport>,
    /// Failures observed before the race ended
    pub failures: Vec<ResponderFailure>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl RaceReport {
    /// Build a report for a won race.
    ///
    /// `outcomes` is whatever the outcome callback collected; only its
    /// failures are kept.
    pub fn from_win(query: &str, win: &RaceWin, outcomes: &[Outcome]) -> Self {
        let failures = outcomes
            .iter()
            .filter_map(|o| match o {
                Outcome::Failure { responder, error } => {
                    Some(ResponderFailure::new(responder.as_str(), error.as_str()))
                }
                Outcome::Success { .. } => None,
            })
            .collect();

        Self {
            query: query.to_string(),
            success: true,
            winner: Some(WinnerReport {
                responder: win.responder.clone(),
                text: win.response.text.clone(),
                model: win.response.model.clone(),
                tokens_used: win.response.tokens_used,
                latency_ms: win.response.latency_ms,
            }),
            failures,
            timed_out: false,
            elapsed_ms: Some(win.elapsed_ms),
        }
    }

    /// Build a report for a race that produced no winner.
    pub fn from_error(query: &str, err: &RaceError) -> Self {
        let (failures, timed_out) = match err {
            RaceError::NoResponders => (Vec::new(), false),
            RaceError::AllFailed {
                failures,
                timed_out,
            } => (failures.clone(), *timed_out),
        };

        Self {
            query: query.to_string(),
            success: false,
            winner: None,
            failures,
            timed_out,
            elapsed_ms: None,
        }
    }

    /// Render for humans: the winner labelled by source, or the failure list.
    pub fn render_text(&self) -> String {
        match &self.winner {
            Some(winner) => format!("[{}] {}", winner.responder, winner.text),
            None if self.failures.is_empty() => "no responders configured".to_string(),
            None => {
                let mut out = if self.timed_out {
                    "all responders failed or timed out".to_string()
                } else {
                    "all responders failed".to_string()
                };
                for failure in &self.failures {
                    out.push_str(&format!("\n  [{}] {}", failure.responder, failure.error));
                }
                out
            }
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    /// Render in the requested format.
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => self.to_json(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::Response;

    fn win() -> RaceWin {
        RaceWin {
            responder: "ollama".to_string(),
            response: Response {
                text: "4".to_string(),
                model: "llama3.2".to_string(),
                tokens_used: Some(12),
                latency_ms: 80,
            },
            elapsed_ms: 85,
        }
    }

    #[test]
    fn test_win_text_is_labelled() {
        let report = RaceReport::from_win("What comes after 3?", &win(), &[]);
        assert_eq!(report.render_text(), "[ollama] 4");
    }

    #[test]
    fn test_win_keeps_only_failures() {
        let outcomes = vec![
            Outcome::Failure {
                responder: "openai".to_string(),
                error: "HTTP 401".to_string(),
            },
            Outcome::Success {
                responder: "ollama".to_string(),
                text: "4".to_string(),
            },
        ];
        let report = RaceReport::from_win("q", &win(), &outcomes);
        assert_eq!(report.failures, vec![ResponderFailure::new("openai", "HTTP 401")]);
    }

    #[test]
    fn test_all_failed_text() {
        let err = RaceError::AllFailed {
            failures: vec![
                ResponderFailure::new("ollama", "connection refused"),
                ResponderFailure::new("openai", "timed out after 100ms"),
            ],
            timed_out: true,
        };
        let report = RaceReport::from_error("q", &err);
        assert!(!report.success);
        assert_eq!(
            report.render_text(),
            "all responders failed or timed out\n  [ollama] connection refused\n  [openai] timed out after 100ms"
        );
    }

    #[test]
    fn test_json_shape() {
        let report = RaceReport::from_win("q", &win(), &[]);
        let value: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["winner"]["responder"], "ollama");
        assert_eq!(value["winner"]["tokens_used"], 12);
        assert_eq!(value["elapsed_ms"], 85);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_json_failure_omits_winner() {
        let report = RaceReport::from_error("q", &RaceError::NoResponders);
        let json = report.to_json(false).unwrap();
        assert!(!json.contains("winner"));
        assert!(json.contains("\"success\":false"));
    }
}
