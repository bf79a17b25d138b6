//! Session domain: the orchestrator that owns all shared session state.
//!
//! Flows:
//!   - capture → batch → solve (one multi-image request)
//!   - dictation → transcript → ask
//!   - resume upload → extract → prime → resume context
//!
//! Every async flow is tagged with the generation current when it
//! started and commits only if that generation is still current. The
//! solve flow additionally holds the solve lock for its whole lifetime.

mod batch;
mod dictation;
mod generation;
mod state;

pub use batch::ScreenshotBatch;
pub use generation::{Generation, GenerationAuthority};
pub use state::{LastRequest, Phase, ResumeContext, SessionView};

use crate::capture::{CaptureItem, CaptureService, TargetLanguage};
use crate::config::PolicySettings;
use crate::extraction::{DocumentExtractor, ExtractionError};
use crate::llm::{prompts, CompletionError, CompletionService, PendingRequest, RetryPolicy, UserContent};
use crate::transcription::{Recognition, RecognitionEvent, TranscriptionService};
use crate::triggers::{Direction, Trigger};
use dictation::ListeningSession;
use state::SessionState;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub const NO_SCREENSHOTS: &str = "No screenshots found.";
pub const BUSY_ANSWERING: &str = "Busy answering";
pub const NETWORK_FAILURE: &str = "Network error: Unable to reach the API after several attempts. \
     Please check your internet connection, API key, and endpoint.";
pub const RESUME_READY: &str = "Resume uploaded and analyzed. You can now ask interview questions.";
pub const RESUME_FAILED: &str = "Failed to parse or analyze resume. Please try again.";
pub const RESUME_UNSUPPORTED: &str = "Unsupported file type. Please upload a PDF or DOCX resume.";

/// External services the session calls into.
pub struct Collaborators {
    pub completion: Arc<dyn CompletionService>,
    pub capture: Arc<dyn CaptureService>,
    pub transcription: Arc<dyn TranscriptionService>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

/// How a completion request ended, from the session's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Answered,
    Failed(CompletionError),
    /// Superseded by a newer generation; nothing was applied.
    Stale,
    /// Nothing to send.
    Ignored,
    /// Another request or a solve is still in flight; nothing was sent.
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// Another solve holds the lock.
    Busy,
    NoScreenshots,
    Settled(RequestOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictationOutcome {
    Listening,
    Stopped,
    Debounced,
    Refused(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Ready,
    Failed(String),
    Stale,
    Busy,
}

/// User-facing text for a classified completion failure.
pub fn failure_message(err: &CompletionError) -> String {
    match err {
        CompletionError::Unreachable(_) => NETWORK_FAILURE.to_string(),
        CompletionError::Configuration(message) => message.clone(),
        other => other.to_string(),
    }
}

struct Inner {
    generation: GenerationAuthority,
    solve_lock: AtomicBool,
    state: Mutex<SessionState>,
    view_tx: watch::Sender<SessionView>,
    collaborators: Collaborators,
    retry: RetryPolicy,
    mic_debounce: Duration,
}

/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

/// Holds the solve lock; releasing it is unconditional.
struct SolveGuard<'a> {
    session: &'a SessionOrchestrator,
}

impl Drop for SolveGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.session.lock();
            state.view.solving = false;
            self.session.publish(&mut state);
        }
        self.session.inner.solve_lock.store(false, Ordering::SeqCst);
    }
}

impl SessionOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        policy: &PolicySettings,
        language: TargetLanguage,
    ) -> Self {
        let generation = GenerationAuthority::new();
        let state = SessionState::new(language, generation.current());
        let (view_tx, _) = watch::channel(state.view.clone());
        Self {
            inner: Arc::new(Inner {
                generation,
                solve_lock: AtomicBool::new(false),
                state: Mutex::new(state),
                view_tx,
                collaborators,
                retry: RetryPolicy::from_settings(policy),
                mic_debounce: policy.mic_debounce,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.inner.view_tx.borrow().clone()
    }

    pub fn current_generation(&self) -> Generation {
        self.inner.generation.current()
    }

    pub fn is_solving(&self) -> bool {
        self.inner.solve_lock.load(Ordering::SeqCst)
    }

    pub fn pending_screenshots(&self) -> usize {
        self.lock().batch.len()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A current request or solve is in flight. New questions wait for
    /// it. Start-over clears both flags, so superseded work never blocks.
    fn is_busy(&self, state: &SessionState) -> bool {
        state.view.thinking || state.view.solving
    }

    fn publish(&self, state: &mut SessionState) {
        state.view.pending_screenshots = state.batch.len();
        state.view.resume_active = state.resume.is_active();
        state.view.language = state.language;
        state.view.generation = self.inner.generation.current().value();
        self.inner.view_tx.send_replace(state.view.clone());
    }

    // ── Triggers ─────────────────────────────────────────────────────

    /// Route one trigger. Async flows are spawned onto the runtime.
    /// Returns false once the session should shut down.
    pub fn dispatch(&self, trigger: Trigger) -> bool {
        log::debug!("[SESSION] Trigger: {:?}", trigger);
        match trigger {
            Trigger::Move(direction) => self.move_window(direction),
            Trigger::ToggleVisibility => self.toggle_visibility(),
            Trigger::StartOver => {
                self.start_over();
            }
            Trigger::ClearResume => self.clear_resume(),
            Trigger::SetLanguage(language) => self.set_language(language),
            Trigger::Screenshot => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.take_screenshot().await;
                });
            }
            Trigger::SolveBatch => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.solve_batch().await;
                });
            }
            Trigger::ToggleDictation => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.toggle_dictation().await;
                });
            }
            Trigger::Ask(question) => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.ask(&question).await;
                });
            }
            Trigger::UploadResume(path) => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.upload_resume(&path).await;
                });
            }
            Trigger::Retry => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.retry_last().await;
                });
            }
            Trigger::Quit => {
                self.start_over();
                log::info!("[SESSION] Quit requested");
                return false;
            }
        }
        true
    }

    /// Window placement is owned by the shell; the session only logs it.
    pub fn move_window(&self, direction: Direction) {
        log::info!("[SESSION] Move window {:?}", direction);
    }

    pub fn toggle_visibility(&self) {
        let mut state = self.lock();
        state.view.visible = !state.view.visible;
        self.publish(&mut state);
    }

    pub fn set_language(&self, language: TargetLanguage) {
        let mut state = self.lock();
        state.language = language;
        self.publish(&mut state);
        log::info!("[SESSION] Target language: {}", language);
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send one request and apply the result if `generation` is still
    /// current when it settles.
    async fn run_request(
        &self,
        content: UserContent,
        language: TargetLanguage,
        generation: Generation,
    ) -> RequestOutcome {
        let authority = &self.inner.generation;

        let system_prompt = {
            let mut state = self.lock();
            if !authority.is_current(generation) {
                log::debug!("[SESSION] {} stale before send", generation);
                return RequestOutcome::Stale;
            }
            state.view.thinking = true;
            state.view.show_retry = false;
            state.last_request = Some(LastRequest {
                content: content.clone(),
                language,
            });
            let prompt = prompts::system_prompt(state.resume.text(), language);
            self.publish(&mut state);
            prompt
        };

        let mut request = PendingRequest {
            system_prompt,
            content,
            language,
            generation,
            attempt: 0,
        };
        let result = self
            .inner
            .retry
            .execute(
                self.inner.collaborators.completion.as_ref(),
                &mut request,
                |g| authority.is_current(g),
            )
            .await;

        let mut state = self.lock();
        if !authority.is_current(generation) {
            log::debug!(
                "[SESSION] Discarding stale result from {} (current {})",
                generation,
                authority.current()
            );
            return RequestOutcome::Stale;
        }

        state.view.thinking = false;
        let outcome = match result {
            Ok(text) => {
                log::info!("[SESSION] {} answered ({} chars)", generation, text.len());
                state.view.show_answer(text);
                RequestOutcome::Answered
            }
            Err(err) => {
                log::error!("[SESSION] {} failed: {}", generation, err);
                state.view.show_status(failure_message(&err));
                state.view.show_retry = err.is_transient();
                RequestOutcome::Failed(err)
            }
        };
        self.publish(&mut state);
        outcome
    }

    /// Typed question. Takes the same path as a final transcript.
    pub async fn ask(&self, question: &str) -> RequestOutcome {
        let question = question.trim();
        if question.is_empty() {
            return RequestOutcome::Ignored;
        }
        let (language, generation) = {
            let mut state = self.lock();
            if self.is_busy(&state) {
                log::info!("[SESSION] Question while busy, ignored");
                return RequestOutcome::Busy;
            }
            state.view.transcript = question.to_string();
            state.view.answer.clear();
            state.view.status = None;
            state.view.thinking = true;
            self.publish(&mut state);
            (state.language, self.inner.generation.current())
        };
        self.run_request(UserContent::Text(question.to_string()), language, generation)
            .await
    }

    /// Resubmit the last payload after an unreachable failure.
    ///
    /// Same generation, fresh attempt counter.
    pub async fn retry_last(&self) -> RequestOutcome {
        let (last, generation) = {
            let mut state = self.lock();
            if self.is_busy(&state) {
                return RequestOutcome::Busy;
            }
            if !state.view.show_retry {
                return RequestOutcome::Ignored;
            }
            let Some(last) = state.last_request.clone() else {
                return RequestOutcome::Ignored;
            };
            state.view.show_retry = false;
            state.view.status = None;
            state.view.thinking = true;
            self.publish(&mut state);
            (last, self.inner.generation.current())
        };
        log::info!("[SESSION] Manual retry at {}", generation);
        self.run_request(last.content, last.language, generation).await
    }

    // ── Screenshots ──────────────────────────────────────────────────

    /// Capture one screenshot into the batch. Allowed while anything else
    /// is in flight; only a start-over in the meantime discards it.
    pub async fn take_screenshot(&self) -> bool {
        let (language, mark) = {
            let state = self.lock();
            (state.language, state.reset_mark)
        };

        let result = self.inner.collaborators.capture.capture().await;

        let mut state = self.lock();
        if state.reset_mark != mark {
            log::debug!("[BATCH] Capture finished after start-over, dropped");
            return false;
        }
        match result {
            Ok(image) => {
                let added = state.batch.add(CaptureItem::new(image, language));
                self.publish(&mut state);
                added
            }
            Err(e) => {
                log::error!("[CAPTURE] Failed: {}", e);
                state
                    .view
                    .show_status(format!("Failed to capture screenshot: {}", e));
                self.publish(&mut state);
                false
            }
        }
    }

    /// Queue an artifact produced elsewhere.
    pub fn add_capture(&self, item: CaptureItem) -> bool {
        let mut state = self.lock();
        let added = state.batch.add(item);
        self.publish(&mut state);
        added
    }

    /// Submit the whole batch as one multi-image request.
    pub async fn solve_batch(&self) -> SolveOutcome {
        if self
            .inner
            .solve_lock
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("[SESSION] Solve already in flight, trigger ignored");
            return SolveOutcome::Busy;
        }
        let _guard = SolveGuard { session: self };

        let snapshot = {
            let mut state = self.lock();
            if state.batch.is_empty() {
                state.view.show_status(NO_SCREENSHOTS);
                self.publish(&mut state);
                None
            } else {
                let generation = self.inner.generation.bump();
                let items = state.batch.snapshot_and_clear();
                state.view.solving = true;
                state.view.answer.clear();
                state.view.status = None;
                self.publish(&mut state);
                Some((items, generation))
            }
        };
        let Some((items, generation)) = snapshot else {
            return SolveOutcome::NoScreenshots;
        };

        let language = items
            .first()
            .map(|item| item.target_language)
            .unwrap_or(TargetLanguage::Java);
        let images: Vec<String> = items.into_iter().map(CaptureItem::into_image).collect();
        log::info!(
            "[SESSION] Solving {} screenshot(s) in {} at {}",
            images.len(),
            language,
            generation
        );
        let content = UserContent::WithImages {
            instruction: prompts::screenshot_instruction(language, images.len()),
            images,
        };

        SolveOutcome::Settled(self.run_request(content, language, generation).await)
    }

    // ── Dictation ────────────────────────────────────────────────────

    /// Mic button / shortcut. Debounced; flips between start and stop.
    pub async fn toggle_dictation(&self) -> DictationOutcome {
        let now = tokio::time::Instant::now();
        let listening = {
            let mut state = self.lock();
            if let Some(last) = state.last_mic_toggle {
                if now.duration_since(last) < self.inner.mic_debounce {
                    log::debug!("[DICTATION] Toggle debounced");
                    return DictationOutcome::Debounced;
                }
            }
            state.last_mic_toggle = Some(now);
            state.active_listen.is_some()
        };

        if listening {
            self.stop_dictation();
            DictationOutcome::Stopped
        } else {
            self.start_dictation().await
        }
    }

    /// Open the microphone and listen until a terminal recognition event,
    /// an explicit stop, or a start-over.
    pub async fn start_dictation(&self) -> DictationOutcome {
        let id = {
            let mut state = self.lock();
            if state.active_listen.is_some() {
                return DictationOutcome::Refused("Already listening".to_string());
            }
            if self.is_busy(&state) {
                return DictationOutcome::Refused(BUSY_ANSWERING.to_string());
            }
            let id = state.next_listen_id;
            state.next_listen_id += 1;
            state.active_listen = Some(id);
            state.view.transcript.clear();
            state.view.answer.clear();
            state.view.status = None;
            state.view.listening = true;
            self.publish(&mut state);
            id
        };

        let started = self.inner.collaborators.transcription.start().await;

        let events = {
            let mut state = self.lock();
            match started {
                Err(e) => {
                    log::error!("[DICTATION] Could not start: {}", e);
                    if state.active_listen == Some(id) {
                        state.active_listen = None;
                        state.view.listening = false;
                        state.view.transcript = e.clone();
                        self.publish(&mut state);
                    }
                    return DictationOutcome::Refused(e);
                }
                Ok(Recognition { events, audio }) => {
                    let session = ListeningSession::new(id, audio);
                    if state.active_listen != Some(id) {
                        // Stopped (or reset) while the recognizer was starting.
                        drop(session);
                        return DictationOutcome::Stopped;
                    }
                    state.listening = Some(session);
                    events
                }
            }
        };

        log::info!("[DICTATION] Listening #{}", id);
        let this = self.clone();
        tokio::spawn(async move { this.listen(id, events).await });
        DictationOutcome::Listening
    }

    /// Explicit stop. Releases the microphone before returning.
    pub fn stop_dictation(&self) {
        let mut state = self.lock();
        if state.active_listen.is_none() && state.listening.is_none() {
            return;
        }
        state.end_listening();
        self.publish(&mut state);
    }

    async fn listen(self, id: u64, mut events: mpsc::UnboundedReceiver<RecognitionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                RecognitionEvent::Interim(text) => {
                    let mut state = self.lock();
                    if state.active_listen != Some(id) {
                        return;
                    }
                    state.view.transcript = format!("Listening... {}", text);
                    self.publish(&mut state);
                }
                RecognitionEvent::Final(text) => {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    let submit = {
                        let mut state = self.lock();
                        if state.active_listen != Some(id) {
                            None
                        } else if self.is_busy(&state) {
                            // A solve started while the user was speaking.
                            state.end_listening();
                            state.view.transcript = text.clone();
                            self.publish(&mut state);
                            log::info!("[DICTATION] Transcript while busy, not sent");
                            None
                        } else {
                            state.end_listening();
                            state.view.transcript = text.clone();
                            state.view.thinking = true;
                            self.publish(&mut state);
                            Some((state.language, self.inner.generation.current()))
                        }
                    };
                    if let Some((language, generation)) = submit {
                        self.run_request(UserContent::Text(text), language, generation)
                            .await;
                    }
                    return;
                }
                RecognitionEvent::Canceled(reason) => {
                    let mut state = self.lock();
                    if state.active_listen == Some(id) {
                        log::warn!("[DICTATION] Canceled: {:?}", reason);
                        state.end_listening();
                        state.view.transcript = reason.user_message();
                        self.publish(&mut state);
                    }
                    return;
                }
                RecognitionEvent::SessionStopped => {
                    let mut state = self.lock();
                    if state.active_listen == Some(id) {
                        state.end_listening();
                        self.publish(&mut state);
                    }
                    return;
                }
            }
        }

        let mut state = self.lock();
        if state.active_listen == Some(id) {
            log::debug!("[DICTATION] Event stream closed");
            state.end_listening();
            self.publish(&mut state);
        }
    }

    // ── Reset ────────────────────────────────────────────────────────

    /// Invalidate everything in flight and clear the session.
    pub fn start_over(&self) -> Generation {
        let mut state = self.lock();
        let generation = self.inner.generation.bump();
        state.reset_mark = generation;
        state.batch.clear();
        state.resume.clear();
        state.last_request = None;
        state.end_listening();
        state.view.transcript.clear();
        state.view.answer.clear();
        state.view.status = None;
        state.view.thinking = false;
        state.view.solving = false;
        state.view.show_retry = false;
        self.publish(&mut state);
        log::info!("[SESSION] Start over, now at {}", generation);
        generation
    }

    // ── Resume ───────────────────────────────────────────────────────

    /// Extract a resume, prime the service with it, then switch the
    /// session into resume mode. All or nothing.
    pub async fn upload_resume(&self, path: &Path) -> ResumeOutcome {
        let mark = {
            let mut state = self.lock();
            if state.view.uploading_resume {
                return ResumeOutcome::Busy;
            }
            state.view.uploading_resume = true;
            self.publish(&mut state);
            state.reset_mark
        };

        let result = self.extract_and_prime(path, mark).await;

        let mut state = self.lock();
        state.view.uploading_resume = false;
        if state.reset_mark != mark {
            log::debug!("[RESUME] Upload finished after start-over, dropped");
            self.publish(&mut state);
            return ResumeOutcome::Stale;
        }
        let outcome = match result {
            Ok(text) => {
                log::info!("[RESUME] Context active ({} chars)", text.len());
                state.resume.set(text);
                state.view.show_status(RESUME_READY);
                ResumeOutcome::Ready
            }
            Err(message) => {
                state.view.show_status(message.clone());
                ResumeOutcome::Failed(message)
            }
        };
        self.publish(&mut state);
        outcome
    }

    async fn extract_and_prime(&self, path: &Path, mark: Generation) -> Result<String, String> {
        let text = self
            .inner
            .collaborators
            .extractor
            .extract(path)
            .await
            .map_err(|e| {
                log::error!("[RESUME] Extraction failed: {}", e);
                match e {
                    ExtractionError::Unsupported(_) => RESUME_UNSUPPORTED.to_string(),
                    ExtractionError::Failed(_) => RESUME_FAILED.to_string(),
                }
            })?;

        let (language, generation) = {
            let state = self.lock();
            (state.language, self.inner.generation.current())
        };
        let mut request = PendingRequest {
            system_prompt: prompts::system_prompt(None, language),
            content: UserContent::Text(prompts::resume_priming_prompt(&text)),
            language,
            generation,
            attempt: 0,
        };
        let primed = self
            .inner
            .retry
            .execute(
                self.inner.collaborators.completion.as_ref(),
                &mut request,
                |_| self.lock().reset_mark == mark,
            )
            .await
            .map_err(|e| {
                log::error!("[RESUME] Priming request failed: {}", e);
                RESUME_FAILED.to_string()
            })?;
        log::debug!("[RESUME] Priming reply: {} chars", primed.len());
        Ok(text)
    }

    pub fn clear_resume(&self) {
        let mut state = self.lock();
        state.resume.clear();
        self.publish(&mut state);
        log::info!("[RESUME] Context cleared");
    }
}
