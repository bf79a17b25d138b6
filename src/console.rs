//! Terminal front end: stdin lines in, session view out.
//!
//! Stands in for the shortcut layer and the overlay window: every line is
//! parsed into a trigger (or a console-only action like feeding the
//! transcriber) and the published view is printed whenever it changes.

use crate::capture::{FileCapture, TargetLanguage};
use crate::config::{self, Settings};
use crate::extraction::{AzureDocumentExtractor, DocumentExtractor, RoutingExtractor};
use crate::llm::CompletionClient;
use crate::session::{Collaborators, Phase, SessionOrchestrator, SessionView};
use crate::transcription::ConsoleTranscriber;
use crate::triggers::{default_bindings, Trigger};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  screenshot <image>   queue an image file as a screenshot
  solve                solve all queued screenshots together
  mic                  toggle dictation
  say <text>           speak into the (console) microphone
  ask <text>           type a question instead of dictating
  lang <python|java|c++>
  resume <file>        upload a resume (.pdf .docx .txt .md)
  clear-resume
  retry                resend the last request after a network failure
  reset                start over
  move <up|down|left|right>, hide
  set-key <key>        store the completion API key in the OS keychain
  quit";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Trigger(Trigger),
    Screenshot(Option<PathBuf>),
    Say(String),
    SetKey(String),
    Help,
    Empty,
}

pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let require = |what: &str| {
        if rest.is_empty() {
            Err(format!("`{}` needs {}", word, what))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word.to_lowercase().as_str() {
        "screenshot" | "shot" => {
            ConsoleCommand::Screenshot((!rest.is_empty()).then(|| PathBuf::from(rest)))
        }
        "solve" => ConsoleCommand::Trigger(Trigger::SolveBatch),
        "mic" => ConsoleCommand::Trigger(Trigger::ToggleDictation),
        "say" => ConsoleCommand::Say(require("some text")?),
        "ask" => ConsoleCommand::Trigger(Trigger::Ask(require("a question")?)),
        "lang" => ConsoleCommand::Trigger(Trigger::SetLanguage(
            require("a language")?.parse::<TargetLanguage>()?,
        )),
        "resume" => ConsoleCommand::Trigger(Trigger::UploadResume(PathBuf::from(require(
            "a file path",
        )?))),
        "clear-resume" => ConsoleCommand::Trigger(Trigger::ClearResume),
        "retry" => ConsoleCommand::Trigger(Trigger::Retry),
        "reset" | "start-over" => ConsoleCommand::Trigger(Trigger::StartOver),
        "move" => ConsoleCommand::Trigger(Trigger::Move(require("a direction")?.parse()?)),
        "hide" | "show" => ConsoleCommand::Trigger(Trigger::ToggleVisibility),
        "set-key" => ConsoleCommand::SetKey(require("a key")?),
        "quit" | "exit" => ConsoleCommand::Trigger(Trigger::Quit),
        "help" | "?" => ConsoleCommand::Help,
        // Shortcut action names (`solveScreenshots`, `moveWindow left`, ...)
        _ => match Trigger::from_shortcut(word, (!rest.is_empty()).then_some(rest)) {
            Some(trigger) => ConsoleCommand::Trigger(trigger),
            None => return Err(format!("Unknown command: {} (try `help`)", word)),
        },
    };
    Ok(command)
}

/// Text block printed for a view. Hidden sessions print nothing.
pub fn render(view: &SessionView) -> String {
    if !view.visible {
        return String::new();
    }
    let phase = match view.phase() {
        Phase::Idle => "idle",
        Phase::Listening => "listening",
        Phase::Thinking => "thinking",
        Phase::SolvingBatch => "solving",
        Phase::UploadingResume => "uploading resume",
    };
    let mut out = format!(
        "── {} │ {} │ {} screenshot(s){}",
        phase,
        view.language,
        view.pending_screenshots,
        if view.resume_active { " │ resume" } else { "" }
    );
    if !view.transcript.is_empty() {
        out.push_str(&format!("\n> {}", view.transcript));
    }
    if let Some(status) = &view.status {
        out.push_str(&format!("\n! {}", status));
    }
    if !view.answer.is_empty() {
        out.push('\n');
        out.push_str(&view.answer);
    }
    if view.show_retry {
        out.push_str("\n(type `retry` to try again)");
    }
    out
}

/// Wire the collaborators and run until `quit` or end of input.
pub async fn run(settings: Settings) {
    let completion = match CompletionClient::new(settings.completion.clone()) {
        Ok(client) => client,
        Err(e) => {
            log::error!("[STARTUP] {}", e);
            return;
        }
    };
    let capture = Arc::new(FileCapture::new());
    let transcriber = Arc::new(ConsoleTranscriber::new());
    let documents = AzureDocumentExtractor::from_settings(&settings.extraction)
        .map(|e| Arc::new(e) as Arc<dyn DocumentExtractor>);

    let session = SessionOrchestrator::new(
        Collaborators {
            completion: Arc::new(completion),
            capture: capture.clone(),
            transcription: transcriber.clone(),
            extractor: Arc::new(RoutingExtractor::new(documents)),
        },
        &settings.policy,
        settings.default_language,
    );

    for (accelerator, trigger) in default_bindings() {
        log::debug!("[STARTUP] Shortcut {} → {:?}", accelerator, trigger);
    }

    let mut views = session.subscribe();
    tokio::spawn(async move {
        let mut last = String::new();
        while views.changed().await.is_ok() {
            let text = render(&views.borrow_and_update());
            if !text.is_empty() && text != last {
                println!("{}", text);
                last = text;
            }
        }
    });

    println!("{}", HELP);
    drive(
        &session,
        &capture,
        &transcriber,
        BufReader::new(tokio::io::stdin()),
    )
    .await;
    log::info!("[CONSOLE] Bye");
}

/// Feed input lines to the session until `quit` or end of input.
pub async fn drive<R>(
    session: &SessionOrchestrator,
    capture: &FileCapture,
    transcriber: &ConsoleTranscriber,
    input: R,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("[CONSOLE] stdin: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(ConsoleCommand::Trigger(trigger)) => {
                if !session.dispatch(trigger) {
                    return;
                }
            }
            Ok(ConsoleCommand::Screenshot(path)) => {
                if let Some(path) = path {
                    capture.enqueue(path);
                }
                // Inline, so piped lines land in the batch in input order.
                session.take_screenshot().await;
            }
            Ok(ConsoleCommand::Say(text)) => {
                if let Err(e) = transcriber.feed(&text) {
                    eprintln!("{}", e);
                }
            }
            Ok(ConsoleCommand::SetKey(key)) => match config::save_api_key(&key) {
                Ok(()) => println!("Key saved. Restart to use it."),
                Err(e) => eprintln!("{}", e),
            },
            Ok(ConsoleCommand::Help) => println!("{}", HELP),
            Ok(ConsoleCommand::Empty) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    // Only reached at end of input; `quit` returns above after its own reset.
    session.start_over();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::Direction;

    #[test]
    fn parses_triggers() {
        assert_eq!(parse_line("solve"), Ok(ConsoleCommand::Trigger(Trigger::SolveBatch)));
        assert_eq!(
            parse_line("  ask   what is a heap? "),
            Ok(ConsoleCommand::Trigger(Trigger::Ask("what is a heap?".into())))
        );
        assert_eq!(
            parse_line("lang C++"),
            Ok(ConsoleCommand::Trigger(Trigger::SetLanguage(TargetLanguage::Cpp)))
        );
        assert_eq!(
            parse_line("move left"),
            Ok(ConsoleCommand::Trigger(Trigger::Move(Direction::Left)))
        );
        assert_eq!(parse_line(""), Ok(ConsoleCommand::Empty));
    }

    #[test]
    fn accepts_shortcut_action_names() {
        assert_eq!(
            parse_line("toggleMic"),
            Ok(ConsoleCommand::Trigger(Trigger::ToggleDictation))
        );
        assert_eq!(
            parse_line("moveWindow up"),
            Ok(ConsoleCommand::Trigger(Trigger::Move(Direction::Up)))
        );
    }

    #[test]
    fn screenshot_path_is_optional() {
        assert_eq!(parse_line("screenshot"), Ok(ConsoleCommand::Screenshot(None)));
        assert_eq!(
            parse_line("screenshot /tmp/q.png"),
            Ok(ConsoleCommand::Screenshot(Some(PathBuf::from("/tmp/q.png"))))
        );
    }

    #[test]
    fn missing_arguments_are_errors() {
        assert!(parse_line("ask").is_err());
        assert!(parse_line("say").is_err());
        assert!(parse_line("lang klingon").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn render_shows_retry_hint_and_hides() {
        let mut view = SessionView::new(TargetLanguage::Python);
        view.status = Some("Network error".into());
        view.show_retry = true;
        let text = render(&view);
        assert!(text.contains("idle"));
        assert!(text.contains("! Network error"));
        assert!(text.contains("retry"));

        view.visible = false;
        assert!(render(&view).is_empty());
    }

    fn console_session() -> (SessionOrchestrator, Arc<FileCapture>, Arc<ConsoleTranscriber>) {
        let capture = Arc::new(FileCapture::new());
        let transcriber = Arc::new(ConsoleTranscriber::new());
        let settings = Settings::default();
        let session = SessionOrchestrator::new(
            Collaborators {
                completion: Arc::new(CompletionClient::new(settings.completion).unwrap()),
                capture: capture.clone(),
                transcription: transcriber.clone(),
                extractor: Arc::new(RoutingExtractor::new(None)),
            },
            &settings.policy,
            settings.default_language,
        );
        (session, capture, transcriber)
    }

    fn write_png(name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 2, image::Rgb(rgb)))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn piped_screenshots_all_reach_the_batch() {
        use tokio::io::AsyncWriteExt;

        let a = write_png("crackmate-console-a.png", [255, 0, 0]);
        let b = write_png("crackmate-console-b.png", [0, 255, 0]);
        let (session, capture, transcriber) = console_session();

        // Both lines are buffered before the loop reads the first one.
        let (mut writer, reader) = tokio::io::duplex(1024);
        let input = format!("screenshot {}\nscreenshot {}\n", a.display(), b.display());
        writer.write_all(input.as_bytes()).await.unwrap();

        let (s, c, t) = (session.clone(), capture.clone(), transcriber.clone());
        let driver = tokio::spawn(async move { drive(&s, &c, &t, BufReader::new(reader)).await });

        for _ in 0..500 {
            if session.pending_screenshots() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(session.pending_screenshots(), 2);
        assert_eq!(session.view().status, None);

        drop(writer);
        driver.await.unwrap();
        assert_eq!(session.pending_screenshots(), 0);

        let _ = std::fs::remove_file(&a);
        let _ = std::fs::remove_file(&b);
    }

    #[tokio::test]
    async fn quit_resets_exactly_once() {
        let (session, capture, transcriber) = console_session();
        let before = session.current_generation().value();
        drive(&session, &capture, &transcriber, &b"lang python\nquit\nsolve\n"[..]).await;
        assert_eq!(session.current_generation().value(), before + 1);
    }

    #[tokio::test]
    async fn end_of_input_resets_once() {
        let (session, capture, transcriber) = console_session();
        let before = session.current_generation().value();
        drive(&session, &capture, &transcriber, &b"hide\n"[..]).await;
        assert_eq!(session.current_generation().value(), before + 1);
    }
}
