//! Screenshot batch: ordered, deduplicated accumulation buffer.

use crate::capture::CaptureItem;

#[derive(Debug, Default)]
pub struct ScreenshotBatch {
    items: Vec<CaptureItem>,
}

impl ScreenshotBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless an item with the same image payload is already queued.
    /// Returns whether the item was added.
    pub fn add(&mut self, item: CaptureItem) -> bool {
        if self.items.iter().any(|existing| existing.same_payload(&item)) {
            log::debug!("[BATCH] Duplicate screenshot ignored");
            return false;
        }
        self.items.push(item);
        log::info!("[BATCH] {} screenshot(s) queued", self.items.len());
        true
    }

    /// Hand the whole batch to a submit and leave an empty one behind.
    pub fn snapshot_and_clear(&mut self) -> Vec<CaptureItem> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
