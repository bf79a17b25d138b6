//! Completion client: one request/response round trip, no retries.
//!
//! Talks to an Azure-OpenAI style chat-completions deployment:
//! `POST {url}openai/deployments/{deployment}/chat/completions`.
//! Failures come back classified so the retry policy can decide what
//! to do with them.

use super::prompts::{MAX_TOKENS, TEMPERATURE};
use super::types::{
    ChatMessage, CompletionBody, CompletionError, CompletionResponse, ErrorEnvelope, UserContent,
};
use crate::config::CompletionSettings;
use async_trait::async_trait;

pub const API_VERSION: &str = "2024-02-15-preview";

/// The seam the session talks through. Implemented by the HTTP client
/// and by test doubles.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &UserContent,
    ) -> Result<String, CompletionError>;
}

/// HTTP client for the remote completion deployment.
pub struct CompletionClient {
    http: reqwest::Client,
    settings: CompletionSettings,
}

impl CompletionClient {
    pub fn new(settings: CompletionSettings) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CompletionError::Local(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { http, settings })
    }

    /// Resolve the endpoint URL and key, or explain what is missing.
    fn endpoint(&self) -> Result<(String, &str), CompletionError> {
        let (Some(url), Some(deployment), Some(key)) = (
            self.settings.api_url.as_deref(),
            self.settings.deployment_id.as_deref(),
            self.settings.api_key.as_deref(),
        ) else {
            return Err(CompletionError::Configuration(
                "Completion API configuration is missing. Set COMPLETION_API_URL, \
                 COMPLETION_DEPLOYMENT_ID and COMPLETION_API_KEY."
                    .to_string(),
            ));
        };
        let endpoint = format!(
            "{}openai/deployments/{}/chat/completions?api-version={}",
            url, deployment, API_VERSION
        );
        Ok((endpoint, key))
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &UserContent,
    ) -> Result<String, CompletionError> {
        let (endpoint, api_key) = self.endpoint()?;

        let body = CompletionBody {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_content.clone()),
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        log::info!(
            "[LLM] Sending completion ({} image(s), system prompt {} chars)",
            user_content.image_count(),
            system_prompt.len()
        );
        let start = std::time::Instant::now();

        let response = self
            .http
            .post(&endpoint)
            .header("api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_send_error)?;
        log::info!("[LLM] {} in {}ms", status, start.elapsed().as_millis());

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|env| env.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            log::error!("[LLM] API returned {}: {}", status, message);
            return Err(CompletionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let content = serde_json::from_str::<CompletionResponse>(&text)
            .ok()
            .and_then(|resp| resp.choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| {
                log::warn!("[LLM] Unexpected body: {}", text.chars().take(200).collect::<String>());
                CompletionError::Local(
                    "Received an unexpected response format from the API.".to_string(),
                )
            })?;

        Ok(strip_markup(&content))
    }
}

/// No response was received unless the request could not even be built.
fn classify_send_error(e: reqwest::Error) -> CompletionError {
    if e.is_builder() {
        CompletionError::Local(e.to_string())
    } else {
        log::warn!("[LLM] No response: {}", e);
        CompletionError::Unreachable(e.to_string())
    }
}

/// Remove bold/italic asterisks and code-fence backticks.
///
/// Section headings are left for the renderer to find.
pub fn strip_markup(text: &str) -> String {
    text.replace(['*', '`'], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn strips_bold_and_fences() {
        let raw = "**Solution:**\n```python\nprint(`x`)\n```\n";
        assert_eq!(strip_markup(raw), "Solution:\npython\nprint(x)");
    }

    #[tokio::test]
    async fn missing_settings_is_configuration_error() {
        let client = CompletionClient::new(CompletionSettings {
            api_url: Some("https://example.test/".into()),
            deployment_id: None,
            api_key: Some("k".into()),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let err = client
            .complete("sys", &UserContent::Text("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Configuration(_)));
    }
}
