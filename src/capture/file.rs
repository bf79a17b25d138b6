//! File-backed capture: reads an image from disk and encodes it.
//!
//! Used by the console front end in place of OS screen capture. The file
//! is decoded once with `image` so garbage never reaches the batch.

use super::CaptureService;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

/// Encode image bytes as a `data:` URI, sniffing the format.
pub fn encode_data_uri(bytes: &[u8]) -> Result<String, String> {
    let format = image::guess_format(bytes).map_err(|e| format!("Not an image: {}", e))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| format!("Image decode failed: {}", e))?;
    let mime = format.to_mime_type();
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
    Ok(format!("data:{};base64,{}", mime, encoded))
}

/// Captures queued files, one per `capture()` call, oldest first.
pub struct FileCapture {
    pending: Mutex<VecDeque<PathBuf>>,
}

impl FileCapture {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a file for a later `capture()`.
    pub fn enqueue(&self, path: impl Into<PathBuf>) {
        if let Ok(mut guard) = self.pending.lock() {
            guard.push_back(path.into());
        }
    }
}

impl Default for FileCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureService for FileCapture {
    async fn capture(&self) -> Result<String, String> {
        let path = self
            .pending
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .ok_or("No image path given")?;

        let start = std::time::Instant::now();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        let uri = encode_data_uri(&bytes)?;
        log::info!(
            "[CAPTURE] {} encoded in {}ms ({} bytes)",
            path.display(),
            start.elapsed().as_millis(),
            bytes.len()
        );
        Ok(uri)
    }
}
