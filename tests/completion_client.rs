//! Integration tests for the HTTP completion client.
//!
//! A one-shot HTTP responder on 127.0.0.1 plays the completion service,
//! so the classification of every response shape is checked against a
//! real socket without any network access.
//!
//! Run with: cargo test --test completion_client

use crackmate_lib::config::CompletionSettings;
use crackmate_lib::llm::{CompletionClient, CompletionError, CompletionService, UserContent};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ── Helper ───────────────────────────────────────────────────────────

/// Serve exactly one request with `status` and `body`. The handle
/// resolves to the raw request text.
async fn respond_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });
    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn client_for(url: &str) -> CompletionClient {
    CompletionClient::new(CompletionSettings {
        api_url: Some(url.to_string()),
        deployment_id: Some("gpt-4o".to_string()),
        api_key: Some("test-key".to_string()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn question() -> UserContent {
    UserContent::Text("Reverse a linked list".to_string())
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_returns_stripped_content() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"**Approach:**\n- Use three pointers `prev`, `cur`, `next`.\n"}}]}"#;
    let (url, server) = respond_once("200 OK", body).await;

    let answer = client_for(&url)
        .complete("You are a coding/aptitude assistant", &question())
        .await
        .unwrap();
    assert_eq!(answer, "Approach:\n- Use three pointers prev, cur, next.");

    let request = server.await.unwrap();
    assert!(request.starts_with(
        "POST /openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
    ));
    assert!(request.to_lowercase().contains("api-key: test-key"));
    assert!(request.contains("\"max_tokens\":1500"));
    assert!(request.contains("Reverse a linked list"));
}

#[tokio::test]
async fn images_are_sent_as_parts_of_one_message() {
    let body = r#"{"choices":[{"message":{"content":"ok"}}]}"#;
    let (url, server) = respond_once("200 OK", body).await;

    let content = UserContent::WithImages {
        instruction: "Solve this".to_string(),
        images: vec![
            "data:image/png;base64,QUFB".to_string(),
            "data:image/png;base64,QkJC".to_string(),
        ],
    };
    client_for(&url).complete("sys", &content).await.unwrap();

    let request = server.await.unwrap();
    assert_eq!(request.matches("\"image_url\"").count(), 4);
    assert!(request.contains("data:image/png;base64,QUFB"));
    assert!(request.contains("data:image/png;base64,QkJC"));
}

#[tokio::test]
async fn error_status_is_rejected_with_service_message() {
    let body = r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#;
    let (url, _server) = respond_once("401 Unauthorized", body).await;

    let err = client_for(&url).complete("sys", &question()).await.unwrap_err();
    assert_eq!(
        err,
        CompletionError::Rejected {
            status: 401,
            message: "Access denied due to invalid subscription key.".to_string(),
        }
    );
    assert!(!err.is_transient());
}

#[tokio::test]
async fn error_status_without_envelope_is_unknown_error() {
    let (url, _server) = respond_once("500 Internal Server Error", "oops").await;

    let err = client_for(&url).complete("sys", &question()).await.unwrap_err();
    assert_eq!(err.to_string(), "API Error: 500 - Unknown error");
}

#[tokio::test]
async fn success_without_content_is_local_error() {
    let (url, _server) = respond_once("200 OK", r#"{"choices":[]}"#).await;

    let err = client_for(&url).complete("sys", &question()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Local(_)));
    assert!(err.to_string().contains("unexpected response format"));
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let err = client_for(&url).complete("sys", &question()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Unreachable(_)));
    assert!(err.is_transient());
}
