//! Shared session state and the view published to the front end.

use super::batch::ScreenshotBatch;
use super::dictation::ListeningSession;
use super::generation::Generation;
use crate::capture::TargetLanguage;
use crate::llm::UserContent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Listening,
    Thinking,
    SolvingBatch,
    UploadingResume,
}

/// Everything the user can see. Published after every committed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub transcript: String,
    pub answer: String,
    /// Status or error line. Mutually exclusive with a fresh answer.
    pub status: Option<String>,
    pub listening: bool,
    pub thinking: bool,
    pub solving: bool,
    pub uploading_resume: bool,
    pub show_retry: bool,
    pub pending_screenshots: usize,
    pub resume_active: bool,
    pub language: TargetLanguage,
    pub visible: bool,
    pub generation: u64,
}

impl SessionView {
    pub fn new(language: TargetLanguage) -> Self {
        Self {
            transcript: String::new(),
            answer: String::new(),
            status: None,
            listening: false,
            thinking: false,
            solving: false,
            uploading_resume: false,
            show_retry: false,
            pending_screenshots: 0,
            resume_active: false,
            language,
            visible: true,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.listening {
            Phase::Listening
        } else if self.solving {
            Phase::SolvingBatch
        } else if self.thinking {
            Phase::Thinking
        } else if self.uploading_resume {
            Phase::UploadingResume
        } else {
            Phase::Idle
        }
    }

    pub(crate) fn show_answer(&mut self, text: String) {
        self.answer = text;
        self.status = None;
        self.show_retry = false;
    }

    pub(crate) fn show_status(&mut self, message: impl Into<String>) {
        self.answer.clear();
        self.status = Some(message.into());
    }
}

/// Extracted resume text. Present means resume mode is active.
#[derive(Debug, Clone, Default)]
pub struct ResumeContext {
    text: Option<String>,
}

impl ResumeContext {
    pub fn set(&mut self, text: String) {
        self.text = Some(text);
    }

    pub fn clear(&mut self) {
        self.text = None;
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.text.is_some()
    }
}

/// The last submitted user payload, kept for the manual retry button.
#[derive(Debug, Clone)]
pub struct LastRequest {
    pub content: UserContent,
    pub language: TargetLanguage,
}

/// Mutable session state. Only the orchestrator touches it, and only
/// through short critical sections that never span an await.
pub(crate) struct SessionState {
    pub batch: ScreenshotBatch,
    pub resume: ResumeContext,
    pub language: TargetLanguage,
    /// Reserved id of the dictation in progress (set before the
    /// recognizer finishes starting).
    pub active_listen: Option<u64>,
    pub listening: Option<ListeningSession>,
    pub next_listen_id: u64,
    pub last_request: Option<LastRequest>,
    /// Generation produced by the most recent start-over.
    pub reset_mark: Generation,
    pub last_mic_toggle: Option<tokio::time::Instant>,
    pub view: SessionView,
}

impl SessionState {
    pub fn new(language: TargetLanguage, reset_mark: Generation) -> Self {
        Self {
            batch: ScreenshotBatch::new(),
            resume: ResumeContext::default(),
            language,
            active_listen: None,
            listening: None,
            next_listen_id: 0,
            last_request: None,
            reset_mark,
            last_mic_toggle: None,
            view: SessionView::new(language),
        }
    }

    /// Release the microphone (if held) and leave Listening.
    pub fn end_listening(&mut self) {
        self.active_listen = None;
        if let Some(mut session) = self.listening.take() {
            session.release();
        }
        self.view.listening = false;
    }
}
