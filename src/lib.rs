//! Crackmate: interview assistant session core.
//!
//! The session orchestrator owns all shared state; everything else is a
//! collaborator behind a trait. No business logic lives here, only module
//! declarations and startup.
//!
//! Domains:
//!   - session        generations, solve lock, batch, dictation, resume mode
//!   - llm            completion client, prompts, retry policy
//!   - capture        screenshot artifacts and the file-backed capturer
//!   - transcription  recognizer events and the console recognizer
//!   - extraction     resume text extraction
//!   - console        the terminal front end

pub mod capture;
pub mod config;
pub mod console;
pub mod extraction;
pub mod llm;
pub mod session;
pub mod transcription;
pub mod triggers;

/// Entry point, called from `main`.
pub fn run() {
    config::load_env_files();
    env_logger::init();

    let settings = config::Settings::from_env();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("[STARTUP] Failed to start async runtime: {}", e);
            return;
        }
    };

    runtime.block_on(console::run(settings));
}
