//! Completion wire types and the failure taxonomy.
//!
//! These match the chat-completions JSON schema of the remote service.
//! Requests serialize directly from these types; responses deserialize
//! into them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One message in the `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(content: UserContent) -> Self {
        let content = match content {
            UserContent::Text(text) => MessageContent::Text(text),
            UserContent::WithImages { instruction, images } => {
                let mut parts = Vec::with_capacity(images.len() + 1);
                parts.push(ContentPart::Text { text: instruction });
                parts.extend(images.into_iter().map(|url| ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                }));
                MessageContent::Parts(parts)
            }
        };
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// Message content is either a bare string or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// What the user is sending: a plain question, or one instruction that
/// covers an ordered list of images. Multi-image submissions are always
/// a single request.
#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    WithImages {
        instruction: String,
        images: Vec<String>,
    },
}

impl UserContent {
    pub fn image_count(&self) -> usize {
        match self {
            UserContent::Text(_) => 0,
            UserContent::WithImages { images, .. } => images.len(),
        }
    }
}

/// Body of `POST .../chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionBody {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// `{ "error": { "message": ... } }` returned alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: Option<String>,
}

/// Classified failure of one completion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Credentials or endpoint missing. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// The service answered with an explicit error status. Never retried.
    #[error("API Error: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// No response at all (timeout, DNS, refused connection).
    #[error("Network error: {0}")]
    Unreachable(String),

    /// Malformed request or unusable response. Never retried.
    #[error("Error: {0}")]
    Local(String),
}

impl CompletionError {
    /// Only connectivity failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CompletionError::Unreachable(_))
    }
}
