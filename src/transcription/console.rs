//! Console-fed transcriber: typed lines stand in for speech.
//!
//! `start()` opens a fresh event channel; each `feed()` emits an interim
//! hypothesis followed by the final transcript. Releasing the audio
//! handle drops the sender, which ends the stream.

use super::{AudioHandle, Recognition, RecognitionEvent, TranscriptionService};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type SenderSlot = Arc<Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>>;

pub struct ConsoleTranscriber {
    sender: SenderSlot,
}

impl ConsoleTranscriber {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver one utterance to the active recognition.
    pub fn feed(&self, text: &str) -> Result<(), String> {
        let guard = self.sender.lock().map_err(|e| e.to_string())?;
        let tx = guard.as_ref().ok_or("Not listening, toggle the mic first")?;
        tx.send(RecognitionEvent::Interim(text.to_string()))
            .and_then(|_| tx.send(RecognitionEvent::Final(text.to_string())))
            .map_err(|_| "Recognition already ended".to_string())
    }

    pub fn is_open(&self) -> bool {
        self.sender.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl Default for ConsoleTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

struct ConsoleMic {
    sender: SenderSlot,
}

impl AudioHandle for ConsoleMic {
    fn release(&mut self) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                log::info!("[DICTATION] Console microphone released");
            }
        }
    }
}

#[async_trait]
impl TranscriptionService for ConsoleTranscriber {
    async fn start(&self) -> Result<Recognition, String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.sender.lock().map_err(|e| e.to_string())?;
        if guard.is_some() {
            return Err("Microphone already in use".to_string());
        }
        *guard = Some(tx);
        log::info!("[DICTATION] Console microphone opened, type `say <text>`");
        Ok(Recognition {
            events: rx,
            audio: Box::new(ConsoleMic {
                sender: Arc::clone(&self.sender),
            }),
        })
    }
}
