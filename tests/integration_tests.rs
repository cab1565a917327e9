//! Integration tests for palaver.
//!
//! Most tests run a whole `ChatSession` against a one-shot HTTP backend on
//! localhost. The live test at the end requires `PALAVER_BASE_URL` and
//! `PALAVER_MODEL` in the environment.

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_test::assert_ok;

use palaver::chat::{ChatConfig, ChatSession, Outcome, Renderer};
use palaver::{
    CompletionClient, CompletionRequest, HttpCompletionClient, LoadStatus, Message, ProviderEntry,
};

#[derive(Default)]
struct Transcript {
    fragments: String,
    lines: Vec<String>,
    errors: Vec<String>,
}

impl Renderer for Transcript {
    fn print_fragment(&mut self, text: &str) {
        self.fragments.push_str(text);
    }
    fn finish_response(&mut self) {}
    fn print_info(&mut self, info: &str) {
        self.lines.push(info.to_string());
    }
    fn print_value(&mut self, label: &str, value: &str) {
        self.lines.push(format!("{label}: {value}"));
    }
    fn print_message(&mut self, role: &str, content: &str) {
        self.lines.push(format!("{role}: {content}"));
    }
    fn print_notice(&mut self, notice: &str) {
        self.lines.push(notice.to_string());
    }
    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }
    fn clear_screen(&mut self) {}
}

/// Serves exactly one HTTP request; returns the base URL and the raw request.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n{body}"
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
    });
    (base_url, rx)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..split]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= split + 4 + length
}

fn config(dir: &Path, base_url: &str) -> ChatConfig {
    let yaml = format!(
        "system_prompt: Be brief.\n\
         default_provider: local\n\
         providers_map:\n  \
           local:\n    \
             model: tiny\n    \
             api_key: sk-local\n    \
             base_url: {base_url}\n\
         conversation_expiry_hours: 1\n"
    );
    ChatConfig::from_yaml_str(&yaml, dir).unwrap()
}

const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
                        data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                        data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                        data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n\
                        data: [DONE]\n\n";

const NDJSON_BODY: &str = "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n\
                           {\"message\":{\"role\":\"assistant\",\"content\":\"!\"},\"done\":false}\n\
                           {\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n";

#[tokio::test]
async fn chat_turn_over_sse_persists_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, request) = serve_once("200 OK", SSE_BODY).await;
    let config = config(dir.path(), &base_url);
    let mut transcript = Transcript::default();
    let client = assert_ok!(HttpCompletionClient::new());
    let mut session = assert_ok!(ChatSession::open(&config, client, &mut transcript));

    let outcome = session.handle_line("Say hello", &mut transcript).await;
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(transcript.fragments, "Hello");
    assert!(transcript.errors.is_empty());

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions "));
    assert!(request.to_lowercase().contains("authorization: bearer sk-local"));
    assert!(request.contains("\"model\":\"tiny\""));
    assert!(request.contains("\"stream\":true"));

    let loaded = config.store().unwrap().load();
    assert!(matches!(loaded.status, LoadStatus::Restored));
    assert_eq!(
        loaded.conversation.messages(),
        &[
            Message::system("Be brief."),
            Message::user("Say hello"),
            Message::assistant("Hello"),
        ]
    );
    assert_eq!(loaded.conversation.model(), "local/tiny");
}

#[tokio::test]
async fn chat_turn_over_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, _request) = serve_once("200 OK", NDJSON_BODY).await;
    let config = config(dir.path(), &base_url);
    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();

    let outcome = session.handle_line("hey", &mut transcript).await;
    assert_eq!(outcome, Outcome::Continue);
    assert_eq!(transcript.fragments, "Hi!");
    assert_eq!(
        session.conversation().messages().last(),
        Some(&Message::assistant("Hi!"))
    );
}

#[tokio::test]
async fn backend_rejection_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, _request) =
        serve_once("401 Unauthorized", "{\"error\":{\"message\":\"bad key\"}}").await;
    let config = config(dir.path(), &base_url);
    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();

    let outcome = session.handle_line("hello", &mut transcript).await;
    assert_eq!(outcome, Outcome::ExitFailure);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(session.conversation().messages().len(), 2);
    assert!(!config.conversation_file.exists());
    assert_eq!(transcript.errors.len(), 1);
}

#[tokio::test]
async fn backend_error_cause_shown_in_debug() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, _request) =
        serve_once("401 Unauthorized", "{\"error\":{\"message\":\"bad key\"}}").await;
    let mut config = config(dir.path(), &base_url);
    config.debug = true;
    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();

    session.handle_line("hello", &mut transcript).await;
    assert_eq!(transcript.errors.len(), 2);
    assert!(transcript.errors[1].contains("bad key"));
}

#[tokio::test]
async fn session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (base_url, _request) = serve_once("200 OK", SSE_BODY).await;
    let config = config(dir.path(), &base_url);
    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();
    session.handle_line("Say hello", &mut transcript).await;
    drop(session);

    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();
    assert!(transcript.lines.is_empty());
    session.handle_line("/conversation", &mut transcript).await;
    assert_eq!(transcript.lines, vec!["USER: Say hello", "ASSISTANT: Hello"]);

    session.handle_line("/delete", &mut transcript).await;
    assert!(!config.conversation_file.exists());
    assert_eq!(session.conversation().messages().len(), 1);
}

#[tokio::test]
async fn bye_and_unknown_commands() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "http://127.0.0.1:9/v1");
    let mut transcript = Transcript::default();
    let mut session =
        ChatSession::open(&config, HttpCompletionClient::new().unwrap(), &mut transcript).unwrap();

    assert_eq!(
        session.handle_line("/frobnicate", &mut transcript).await,
        Outcome::Continue
    );
    assert_eq!(
        transcript.lines.last().unwrap(),
        "Unknown command. Use /? for help."
    );
    assert_eq!(
        session.handle_line("/BYE", &mut transcript).await,
        Outcome::ExitSuccess
    );
}

#[tokio::test]
async fn live_backend_streams_fragments() {
    // This test requires PALAVER_BASE_URL and PALAVER_MODEL to be set
    let (Ok(base_url), Ok(model)) = (
        std::env::var("PALAVER_BASE_URL"),
        std::env::var("PALAVER_MODEL"),
    ) else {
        eprintln!("Skipping test: PALAVER_BASE_URL or PALAVER_MODEL not set");
        return;
    };
    let api_key = std::env::var("PALAVER_API_KEY").unwrap_or_default();

    let client = HttpCompletionClient::new().expect("Failed to create client");
    let entry = ProviderEntry::new(model.clone(), api_key, base_url);
    let request = CompletionRequest::new(
        format!("live/{model}"),
        &entry,
        &[Message::system("Be brief."), Message::user("Count to 3")],
    );
    let stream = client.stream(request).await;
    assert!(stream.is_ok(), "Stream request should succeed");
}
