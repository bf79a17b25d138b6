//! Azure Document Intelligence: PDF/DOCX text via a long-running job.
//!
//! Submit the file to the prebuilt-document model, then poll the
//! `operation-location` URL until the job succeeds, fails, or the poll
//! budget runs out.

use super::{non_empty, DocumentExtractor, DocumentKind, ExtractionError};
use crate::config::ExtractionSettings;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const ANALYZE_API_VERSION: &str = "2023-07-31";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_POLLS: u32 = 20;

#[derive(Debug, Deserialize)]
struct AnalyzeStatus {
    status: String,
    #[serde(rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    content: Option<String>,
}

/// Where a poll left the job.
#[derive(Debug, PartialEq)]
enum PollState {
    Running,
    Succeeded(String),
    Failed,
}

fn parse_poll(body: &str) -> Result<PollState, ExtractionError> {
    let status: AnalyzeStatus = serde_json::from_str(body)
        .map_err(|e| ExtractionError::Failed(format!("Bad analyze status: {}", e)))?;
    Ok(match status.status.as_str() {
        "succeeded" => PollState::Succeeded(
            status
                .analyze_result
                .and_then(|r| r.content)
                .unwrap_or_default(),
        ),
        "failed" => PollState::Failed,
        _ => PollState::Running,
    })
}

pub struct AzureDocumentExtractor {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzureDocumentExtractor {
    /// `None` when the endpoint or key is not configured.
    pub fn from_settings(settings: &ExtractionSettings) -> Option<Self> {
        let endpoint = settings.endpoint.clone()?;
        let api_key = settings.api_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn submit(&self, bytes: Vec<u8>, kind: DocumentKind) -> Result<String, ExtractionError> {
        let url = format!(
            "{}formrecognizer/documentModels/prebuilt-document:analyze?api-version={}",
            self.endpoint, ANALYZE_API_VERSION
        );
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", kind.content_type())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExtractionError::Failed(format!("Analyze request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractionError::Failed(format!(
                "Analyze rejected ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| ExtractionError::Failed("No operation-location header".to_string()))
    }

    async fn poll(&self, operation: &str) -> Result<String, ExtractionError> {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let body = self
                .http
                .get(operation)
                .header("Ocp-Apim-Subscription-Key", &self.api_key)
                .send()
                .await
                .map_err(|e| ExtractionError::Failed(format!("Poll failed: {}", e)))?
                .text()
                .await
                .map_err(|e| ExtractionError::Failed(format!("Poll failed: {}", e)))?;

            match parse_poll(&body)? {
                PollState::Succeeded(content) => {
                    log::info!("[RESUME] Analysis finished after {} poll(s)", attempt);
                    return Ok(content);
                }
                PollState::Failed => {
                    return Err(ExtractionError::Failed(
                        "Document Intelligence failed to analyze the document.".to_string(),
                    ))
                }
                PollState::Running => {
                    log::debug!("[RESUME] Poll {}/{}: still running", attempt, self.max_polls)
                }
            }
        }
        Err(ExtractionError::Failed(
            "Timed out waiting for Document Intelligence.".to_string(),
        ))
    }
}

#[async_trait]
impl DocumentExtractor for AzureDocumentExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let kind = DocumentKind::from_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ExtractionError::Failed(format!("{}: {}", path.display(), e)))?;
        log::info!("[RESUME] Submitting {} ({} bytes)", path.display(), bytes.len());

        let operation = self.submit(bytes, kind).await?;
        let text = self.poll(&operation).await?;
        non_empty(text)
    }
}
