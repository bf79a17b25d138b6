//! Document extraction domain: resume file → plain text.
//!
//! Format parsing is delegated: plain-text files are read directly,
//! PDF/DOCX go to Document Intelligence. Anything else is refused before
//! any I/O happens.

mod azure;

pub use azure::AzureDocumentExtractor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Supported resume kinds, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" => Ok(DocumentKind::PlainText),
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            _ => Err(ExtractionError::Unsupported(path.display().to_string())),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentKind::PlainText => "text/plain",
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// Reads `.txt` / `.md` resumes as-is.
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExtractionError::Failed(format!("{}: {}", path.display(), e)))?;
        non_empty(text)
    }
}

/// Picks an extractor by file extension.
pub struct RoutingExtractor {
    plain: PlainTextExtractor,
    documents: Option<Arc<dyn DocumentExtractor>>,
}

impl RoutingExtractor {
    /// `documents` handles PDF/DOCX. Without it those formats fail with a
    /// configuration message.
    pub fn new(documents: Option<Arc<dyn DocumentExtractor>>) -> Self {
        Self {
            plain: PlainTextExtractor,
            documents,
        }
    }
}

#[async_trait]
impl DocumentExtractor for RoutingExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        match DocumentKind::from_path(path)? {
            DocumentKind::PlainText => self.plain.extract(path).await,
            DocumentKind::Pdf | DocumentKind::Docx => match &self.documents {
                Some(extractor) => extractor.extract(path).await,
                None => Err(ExtractionError::Failed(
                    "Document extraction is not configured. Set DOC_INTELLIGENCE_ENDPOINT \
                     and DOC_INTELLIGENCE_KEY."
                        .to_string(),
                )),
            },
        }
    }
}

fn non_empty(text: String) -> Result<String, ExtractionError> {
    let text = text.trim();
    if text.is_empty() {
        Err(ExtractionError::Failed("Document contains no text".to_string()))
    } else {
        Ok(text.to_string())
    }
}
