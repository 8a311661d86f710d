//! Table-extraction responder backed by the ExtractTable HTTP API.
//!
//! The query is a path to a PDF or image. The document is uploaded to the
//! trigger endpoint; large documents come back as a job id that is polled
//! until the job leaves the `Processing` state. Extracted tables are rendered
//! as Markdown.

use super::{http_error, request_error, Query, Responder, Response};
use crate::config::ExtractTableConfig;
use crate::error::ResponderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Model label reported for extraction results.
const MODEL: &str = "extracttable";

/// Upper bound for the credit check, which is a single small GET.
const USAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Responder that turns a document path into Markdown tables.
pub struct ExtractTableResponder {
    name: String,
    api_key: String,
    trigger_endpoint: String,
    result_endpoint: String,
    validator_endpoint: String,
    pages: String,
    poll_interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
}

/// Credit usage reported by the validator endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Total credits on the plan
    #[serde(default)]
    pub credits: u64,
    /// Jobs waiting to be processed
    #[serde(default)]
    pub queued: u64,
    /// Credits already consumed
    #[serde(default)]
    pub used: u64,
}

impl Usage {
    pub fn remaining(&self) -> u64 {
        self.credits.saturating_sub(self.used)
    }
}

impl ExtractTableResponder {
    pub fn new(config: &ExtractTableConfig, api_key: &str) -> Self {
        Self {
            name: "extract_table".to_string(),
            api_key: api_key.to_string(),
            trigger_endpoint: config.trigger_endpoint.trim_end_matches('/').to_string(),
            result_endpoint: config.result_endpoint.trim_end_matches('/').to_string(),
            validator_endpoint: config.validator_endpoint.trim_end_matches('/').to_string(),
            pages: config.pages.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    /// Override which PDF pages are processed ("1", "1,3-4", "all").
    pub fn with_pages(mut self, pages: &str) -> Self {
        self.pages = pages.to_string();
        self
    }

    /// Check the API key and report plan usage.
    pub async fn check_usage(&self) -> Result<Usage, ResponderError> {
        let resp = self
            .client
            .get(&self.validator_endpoint)
            .header("x-api-key", &self.api_key)
            .timeout(USAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error(&self.name, USAGE_TIMEOUT, e))?;

        if !resp.status().is_success() {
            return Err(http_error(&self.name, resp).await);
        }

        #[derive(Deserialize)]
        struct ValidatorResponse {
            usage: Usage,
        }

        let validated: ValidatorResponse =
            resp.json().await.map_err(|e| ResponderError::Parse {
                message: format!("Failed to parse ExtractTable usage: {e}"),
            })?;
        Ok(validated.usage)
    }

    async fn trigger(&self, path: &Path) -> Result<JobResponse, ResponderError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ResponderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        tracing::debug!(
            "Uploading {} ({} bytes, pages={}) for table extraction",
            path.display(),
            bytes.len(),
            self.pages
        );

        let form = reqwest::multipart::Form::new()
            .text("pages", self.pages.clone())
            .part(
                "input",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let resp = self
            .client
            .post(&self.trigger_endpoint)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(&self.name, self.timeout, e))?;
        parse_job(&self.name, resp).await
    }

    async fn poll(&self, job_id: &str) -> Result<JobResponse, ResponderError> {
        let resp = self
            .client
            .get(format!("{}/", self.result_endpoint))
            .query(&[("JobId", job_id)])
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error(&self.name, self.timeout, e))?;
        parse_job(&self.name, resp).await
    }
}

/// Trigger/result endpoint reply.
#[derive(Debug, Deserialize)]
struct JobResponse {
    #[serde(rename = "JobStatus")]
    job_status: String,
    #[serde(rename = "JobId", default)]
    job_id: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Tables", default)]
    tables: Vec<ExtractedTable>,
}

#[derive(Debug, Deserialize)]
struct ExtractedTable {
    /// Row index -> column index -> cell
    #[serde(rename = "TableJson", default)]
    table_json: BTreeMap<String, BTreeMap<String, Value>>,
}

async fn parse_job(label: &str, resp: reqwest::Response) -> Result<JobResponse, ResponderError> {
    if !resp.status().is_success() {
        return Err(http_error(label, resp).await);
    }
    resp.json().await.map_err(|e| ResponderError::Parse {
        message: format!("Failed to parse ExtractTable response: {e}"),
    })
}

/// Row or column position. Numeric keys ("01", "1", "10") compare by value
/// and sort before any non-numeric key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IndexKey {
    Number(usize),
    Name(String),
}

impl IndexKey {
    fn parse(key: &str) -> Self {
        match key.trim().parse::<usize>() {
            Ok(n) => Self::Number(n),
            Err(_) => Self::Name(key.to_string()),
        }
    }
}

fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    text.replace('|', "\\|").replace(['\r', '\n'], " ").trim().to_string()
}

/// Render one extracted table as Markdown. The first row is the header.
fn render_markdown(table: &BTreeMap<String, BTreeMap<String, Value>>) -> String {
    // Re-key by parsed index so "1" and "01" land in the same row or column
    let mut rows: BTreeMap<IndexKey, BTreeMap<IndexKey, &Value>> = BTreeMap::new();
    for (row_key, row) in table {
        let cells = rows.entry(IndexKey::parse(row_key)).or_default();
        for (col_key, value) in row {
            cells.entry(IndexKey::parse(col_key)).or_insert(value);
        }
    }

    let columns: BTreeSet<&IndexKey> = rows.values().flat_map(|row| row.keys()).collect();
    if rows.is_empty() || columns.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.values().enumerate() {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| cell_text(row.get(*c).copied()))
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", "---|".repeat(columns.len())));
        }
    }
    lines.join("\n")
}

#[async_trait]
impl Responder for ExtractTableResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.check_usage().await.is_ok()
    }

    async fn respond(&self, query: &Query) -> Result<Response, ResponderError> {
        let start = Instant::now();
        let path = PathBuf::from(shellexpand::tilde(query.as_str().trim()).into_owned());

        let mut job = self.trigger(&path).await?;
        while job.job_status == "Processing" {
            let job_id = job.job_id.clone().ok_or_else(|| ResponderError::Parse {
                message: "ExtractTable job is processing but returned no JobId".to_string(),
            })?;
            tracing::debug!("ExtractTable job {job_id} still processing");
            tokio::time::sleep(self.poll_interval).await;
            job = self.poll(&job_id).await?;
        }

        if job.job_status != "Success" {
            return Err(ResponderError::Job {
                message: job
                    .message
                    .unwrap_or_else(|| format!("job status {}", job.job_status)),
            });
        }

        let rendered: Vec<String> = job
            .tables
            .iter()
            .map(|t| render_markdown(&t.table_json))
            .filter(|t| !t.is_empty())
            .collect();
        if rendered.is_empty() {
            return Err(ResponderError::Parse {
                message: format!("No tables detected in {}", path.display()),
            });
        }

        Ok(Response {
            text: rendered.join("\n\n"),
            model: MODEL.to_string(),
            tokens_used: None,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ExtractTableConfig {
        ExtractTableConfig {
            api_key: String::new(),
            trigger_endpoint: format!("{}/trigger", server.uri()),
            result_endpoint: format!("{}/result", server.uri()),
            validator_endpoint: format!("{}/validator", server.uri()),
            pages: "all".to_string(),
            poll_interval_ms: 10,
            timeout_ms: 5000,
        }
    }

    fn sample_pdf() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4 fake").unwrap();
        file
    }

    fn blood_panel() -> serde_json::Value {
        json!({
            "0": {"0": "Test", "1": "Value"},
            "1": {"0": "Hemoglobin", "1": "14.2"},
            "2": {"0": "Platelets", "1": "250"}
        })
    }

    #[test]
    fn test_render_markdown_orders_numerically() {
        let mut table: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for i in 0..11 {
            let mut row = BTreeMap::new();
            row.insert("0".to_string(), json!(format!("r{i}")));
            row.insert("1".to_string(), json!(i));
            table.insert(i.to_string(), row);
        }
        let md = render_markdown(&table);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "| r0 | 0 |");
        assert_eq!(lines[1], "|---|---|");
        assert_eq!(lines[2], "| r1 | 1 |");
        assert_eq!(lines.last().copied(), Some("| r10 | 10 |"));
    }

    #[test]
    fn test_render_markdown_escapes_and_fills_gaps() {
        let table: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_value(json!({
            "0": {"0": "a|b", "1": "c"},
            "1": {"1": "multi\nline"}
        }))
        .unwrap();
        assert_eq!(
            render_markdown(&table),
            "| a\\|b | c |\n|---|---|\n|  | multi line |"
        );
    }

    #[test]
    fn test_render_markdown_merges_zero_padded_columns() {
        let table: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_value(json!({
            "0": {"0": "Test", "1": "Value"},
            "1": {"00": "Sodium", "01": "140"}
        }))
        .unwrap();
        assert_eq!(
            render_markdown(&table),
            "| Test | Value |\n|---|---|\n| Sodium | 140 |"
        );
    }

    #[tokio::test]
    async fn test_extract_success_renders_tables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trigger"))
            .and(header("x-api-key", "et-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "JobStatus": "Success",
                "Tables": [{"TableJson": blood_panel()}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pdf = sample_pdf();
        let responder = ExtractTableResponder::new(&config_for(&server), "et-key");
        let response = responder
            .respond(&Query::new(pdf.path().to_string_lossy()))
            .await
            .unwrap();
        assert!(response.text.starts_with("| Test | Value |\n|---|---|"));
        assert!(response.text.contains("| Hemoglobin | 14.2 |"));
        assert_eq!(response.model, "extracttable");
    }

    #[tokio::test]
    async fn test_processing_job_is_polled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trigger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "JobStatus": "Processing",
                "JobId": "job-42"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/result/"))
            .and(query_param("JobId", "job-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "JobStatus": "Success",
                "Tables": [{"TableJson": blood_panel()}, {"TableJson": blood_panel()}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pdf = sample_pdf();
        let responder = ExtractTableResponder::new(&config_for(&server), "et-key");
        let response = responder
            .respond(&Query::new(pdf.path().to_string_lossy()))
            .await
            .unwrap();
        assert_eq!(response.text.matches("| Test | Value |").count(), 2);
        assert!(response.text.contains("|\n\n| Test"));
    }

    #[tokio::test]
    async fn test_failed_job_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trigger"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "JobStatus": "Failed",
                "Message": "Insufficient credits"
            })))
            .mount(&server)
            .await;

        let pdf = sample_pdf();
        let responder = ExtractTableResponder::new(&config_for(&server), "et-key");
        let err = responder
            .respond(&Query::new(pdf.path().to_string_lossy()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::Job { .. }));
        assert!(err.to_string().contains("Insufficient credits"));
    }

    #[tokio::test]
    async fn test_missing_document_fails_before_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let responder = ExtractTableResponder::new(&config_for(&server), "et-key");
        let err = responder
            .respond(&Query::new("/nonexistent/upload-dir/data.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResponderError::Io { .. }));
    }

    #[tokio::test]
    async fn test_check_usage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/validator"))
            .and(header("x-api-key", "et-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "usage": {"credits": 100, "queued": 0, "used": 37}
            })))
            .mount(&server)
            .await;

        let responder = ExtractTableResponder::new(&config_for(&server), "et-key");
        let usage = responder.check_usage().await.unwrap();
        assert_eq!(usage.used, 37);
        assert_eq!(usage.remaining(), 63);
        assert!(responder.is_available().await);
    }

    #[tokio::test]
    async fn test_invalid_key_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/validator"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"Message": "Invalid API Key"})),
            )
            .mount(&server)
            .await;

        let responder = ExtractTableResponder::new(&config_for(&server), "wrong");
        let err = responder.check_usage().await.unwrap_err();
        assert!(err.to_string().contains("403"));
        assert!(!responder.is_available().await);
    }
}
