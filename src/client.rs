//! Streaming completion clients.
//!
//! [`CompletionClient`] is the seam between a chat session and a backend:
//! one call, one lazy stream of text fragments. [`HttpCompletionClient`]
//! speaks the OpenAI-compatible `chat/completions` API that OpenAI, Ollama,
//! Groq, OpenRouter, vLLM and llama.cpp all serve.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::STREAM_REQUESTS;
use crate::sse::process_chunks;
use crate::types::{Message, ProviderEntry, split_model};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A finite, non-restartable stream of non-empty text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything needed to ask a backend for one streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The `"<provider>/<model-id>"` string.
    pub model: String,
    /// The bearer credential; empty to send no `Authorization` header.
    pub api_key: String,
    /// The provider's base URL.
    pub base_url: String,
    /// The full message history, system prompt first.
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// Builds a request from a resolved provider entry.
    pub fn new(model: impl Into<String>, entry: &ProviderEntry, messages: &[Message]) -> Self {
        Self {
            model: model.into(),
            api_key: entry.api_key.clone(),
            base_url: entry.base_url.clone(),
            messages: messages.to_vec(),
        }
    }

    /// Returns the model id sent on the wire, without the provider prefix.
    pub fn model_id(&self) -> &str {
        split_model(&self.model).map_or(self.model.as_str(), |(_, id)| id)
    }
}

/// A backend that streams completions.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Starts a streamed completion.
    ///
    /// Failures may surface here, before any fragment, or as an error item
    /// inside the stream. Either way no retry is attempted.
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream>;
}

/// Client for OpenAI-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: ReqwestClient,
    connect_timeout: Duration,
}

impl HttpCompletionClient {
    /// Create a new client with the default connect timeout.
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with a custom connect timeout.
    ///
    /// There is no overall request timeout: a response streams for as long
    /// as the backend keeps sending.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }

    /// Returns the `chat/completions` URL under `base_url`.
    pub fn endpoint(base_url: &str) -> Result<Url> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join("chat/completions")?)
    }

    fn headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        if !api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                Error::authentication("API key contains characters not allowed in a header")
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ErrorDetail {
            Object {
                #[serde(rename = "type")]
                error_type: Option<String>,
                message: Option<String>,
            },
            Text(String),
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let (error_type, error_message) =
            match serde_json::from_str::<ErrorResponse>(&error_body).ok().and_then(|e| e.error) {
                Some(ErrorDetail::Object {
                    error_type,
                    message,
                }) => (error_type, message.unwrap_or_else(|| error_body.clone())),
                Some(ErrorDetail::Text(message)) => (None, message),
                None => (None, error_body.clone()),
            };

        match status_code {
            400 | 422 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            502..=504 => Error::service_unavailable(error_message),
            _ => Error::api(status_code, error_type, error_message),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[async_trait::async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream> {
        STREAM_REQUESTS.click();
        let url = Self::endpoint(&request.base_url)?;
        let body = ChatCompletionRequest {
            model: request.model_id(),
            messages: &request.messages,
            stream: true,
        };
        tracing::debug!(%url, model = body.model, messages = body.messages.len(), "starting completion stream");

        let response = self
            .client
            .post(url)
            .headers(Self::headers(&request.api_key)?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.connect_timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(process_chunks(response.bytes_stream())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            HttpCompletionClient::endpoint("https://api.openai.com/v1")
                .unwrap()
                .as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            HttpCompletionClient::endpoint("http://localhost:11434/v1/")
                .unwrap()
                .as_str(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        let err = HttpCompletionClient::endpoint("not a url").unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn request_strips_provider_prefix() {
        let entry = ProviderEntry::new("llama3", "", "http://localhost:11434/v1");
        let request = CompletionRequest::new("ollama/llama3", &entry, &[Message::system("s")]);
        assert_eq!(request.model_id(), "llama3");
        assert_eq!(request.base_url, "http://localhost:11434/v1");

        let request = CompletionRequest::new("openrouter/meta/llama", &entry, &[]);
        assert_eq!(request.model_id(), "meta/llama");
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![Message::system("s"), Message::user("u")];
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "s"},
                    {"role": "user", "content": "u"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn headers_omit_empty_key() {
        let headers = HttpCompletionClient::headers("").unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
        let headers = HttpCompletionClient::headers("sk-test").unwrap();
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer sk-test"
        );
        assert!(HttpCompletionClient::headers("bad\nkey").is_err());
    }

    #[test]
    fn client_creation() {
        let client = HttpCompletionClient::new().unwrap();
        assert_eq!(client.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        let client = HttpCompletionClient::with_connect_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client.connect_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let client = HttpCompletionClient::with_connect_timeout(Duration::from_secs(2)).unwrap();
        let entry = ProviderEntry::new("m", "", "http://127.0.0.1:9/v1");
        let request = CompletionRequest::new("local/m", &entry, &[Message::system("s")]);
        let err = match client.stream(request).await {
            Ok(_) => panic!("nothing listens on the discard port"),
            Err(err) => err,
        };
        assert!(err.is_transport());
    }
}
