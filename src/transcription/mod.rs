//! Transcription domain: live dictation turned into recognition events.
//!
//! A started recognition hands back two things that belong together: the
//! event stream and the audio capture handle. Whoever owns the handle is
//! responsible for releasing it on every exit path.

mod console;

pub use console::ConsoleTranscriber;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Why the recognizer gave up without a final transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    Error(String),
    EndOfStream,
    Other,
}

impl CancelReason {
    /// Message shown in place of the transcript.
    pub fn user_message(&self) -> String {
        match self {
            CancelReason::Error(details) => format!("Speech recognition error: {}", details),
            CancelReason::EndOfStream => {
                "No speech detected. Please try again and speak clearly.".to_string()
            }
            CancelReason::Other => "Speech recognition was canceled.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Partial hypothesis while the user is still speaking.
    Interim(String),
    /// Terminal: the recognized utterance.
    Final(String),
    /// Terminal: recognition failed or was cancelled.
    Canceled(CancelReason),
    /// Terminal: the underlying session ended.
    SessionStopped,
}

/// Microphone stream + recognizer handle. `release` stops both.
pub trait AudioHandle: Send {
    fn release(&mut self);
}

/// A running recognition.
pub struct Recognition {
    pub events: mpsc::UnboundedReceiver<RecognitionEvent>,
    pub audio: Box<dyn AudioHandle>,
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Open the microphone and begin continuous recognition.
    async fn start(&self) -> Result<Recognition, String>;
}
