use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One decoded chunk of a streaming completion.
///
/// Backends disagree on the chunk shape. OpenAI-compatible servers send
/// `{"choices": [{"delta": {"content": "..."}}]}`; Ollama's native API sends
/// `{"message": {"role": "assistant", "content": "..."}}`. Both, plus an
/// in-band error object, decode into this enum and reduce to the same
/// fragment via [`CompletionChunk::into_fragment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionChunk {
    /// A chat-completions delta chunk.
    Delta {
        /// The streamed choices; only the first is used.
        choices: Vec<DeltaChoice>,
    },

    /// A raw message chunk.
    Message {
        /// The partial message.
        message: ChunkMessage,
    },

    /// An error reported inside the stream.
    Error {
        /// The error payload, either a string or an object with a `message`.
        error: Value,
    },
}

/// A choice inside a [`CompletionChunk::Delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaChoice {
    /// The incremental content, absent on role-only or finish chunks.
    #[serde(default)]
    pub delta: Option<ChunkMessage>,
}

/// The content-bearing part of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMessage {
    /// The text, if this chunk carries any.
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Reduces the chunk to its text fragment.
    ///
    /// Returns `Ok(None)` for chunks with no content or empty content, and an
    /// error for in-band error chunks.
    pub fn into_fragment(self) -> Result<Option<String>> {
        let content = match self {
            CompletionChunk::Delta { choices } => choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content),
            CompletionChunk::Message { message } => message.content,
            CompletionChunk::Error { error } => {
                let message = match &error {
                    Value::String(message) => message.clone(),
                    Value::Object(object) => object
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string()),
                    other => other.to_string(),
                };
                return Err(Error::streaming(
                    format!("backend reported an error: {message}"),
                    None,
                ));
            }
        };
        Ok(content.filter(|content| !content.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(raw: &str) -> Result<Option<String>> {
        serde_json::from_str::<CompletionChunk>(raw)
            .expect("chunk should decode")
            .into_fragment()
    }

    #[test]
    fn delta_shape() {
        let raw = r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(fragment(raw).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn message_shape() {
        let raw = r#"{"model":"llama3","message":{"role":"assistant","content":"lo"},"done":false}"#;
        assert_eq!(fragment(raw).unwrap(), Some("lo".to_string()));
    }

    #[test]
    fn contentless_chunks_yield_nothing() {
        assert_eq!(
            fragment(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            None
        );
        assert_eq!(
            fragment(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap(),
            None
        );
        assert_eq!(fragment(r#"{"choices":[]}"#).unwrap(), None);
        assert_eq!(
            fragment(r#"{"choices":[{"delta":{"content":null}}]}"#).unwrap(),
            None
        );
        assert_eq!(
            fragment(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap(),
            None
        );
    }

    #[test]
    fn error_chunks() {
        let err = fragment(r#"{"error":{"message":"model not loaded","type":"server"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("model not loaded"));

        let err = fragment(r#"{"error":"out of memory"}"#).unwrap_err();
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn unrecognized_shape_fails_to_decode() {
        assert!(serde_json::from_str::<CompletionChunk>(r#"{"text":"hi"}"#).is_err());
    }
}
