//! Scoped ownership of the microphone while Listening.
//!
//! The audio handle is released exactly once: explicitly on stop /
//! start-over / a terminal recognition event, or on drop as the last
//! resort.

use crate::transcription::AudioHandle;

pub struct ListeningSession {
    id: u64,
    audio: Option<Box<dyn AudioHandle>>,
}

impl ListeningSession {
    pub fn new(id: u64, audio: Box<dyn AudioHandle>) -> Self {
        Self {
            id,
            audio: Some(audio),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn release(&mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.release();
            log::info!("[DICTATION] Listening #{} released", self.id);
        }
    }
}

impl Drop for ListeningSession {
    fn drop(&mut self) {
        self.release();
    }
}
