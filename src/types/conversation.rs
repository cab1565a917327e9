use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Message, MessageRole};

/// A conversation with a single system prompt at its head.
///
/// The message list is never empty, its first message is the only system
/// message, and `model` is always `"<provider>/<model-id>"`. Persisted
/// conversations that break these rules fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConversationFile")]
pub struct Conversation {
    messages: Vec<Message>,
    model: String,
    #[serde(
        serialize_with = "crate::utils::time::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    last_message_time: Option<OffsetDateTime>,
}

impl Conversation {
    /// Creates a fresh conversation holding only the system prompt.
    pub fn new(system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            model: model.into(),
            last_message_time: None,
        }
    }

    /// Returns every message, system prompt first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the user and assistant messages.
    pub fn turns(&self) -> &[Message] {
        &self.messages[1..]
    }

    /// Returns the system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Discards the whole history and starts over from a new system prompt.
    pub fn replace_prompt(&mut self, system_prompt: impl Into<String>) {
        self.messages = vec![Message::system(system_prompt)];
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Returns the `"<provider>/<model-id>"` string.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the provider half of the model string.
    pub fn provider(&self) -> &str {
        split_model(&self.model).map_or(self.model.as_str(), |(provider, _)| provider)
    }

    /// Returns the model-id half of the model string.
    pub fn model_id(&self) -> &str {
        split_model(&self.model).map_or("", |(_, id)| id)
    }

    /// Points the conversation at another provider and model.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Returns when the last assistant turn was saved, if ever.
    pub fn last_message_time(&self) -> Option<OffsetDateTime> {
        self.last_message_time
    }

    /// Records the time of a completed assistant turn.
    pub fn stamp(&mut self, now: OffsetDateTime) {
        self.last_message_time = Some(now);
    }
}

/// Splits `"provider/model-id"` at the first slash.
///
/// The model id may itself contain slashes (`openrouter/meta-llama/llama-3`).
pub fn split_model(model: &str) -> Option<(&str, &str)> {
    model
        .split_once('/')
        .filter(|(provider, id)| !provider.is_empty() && !id.is_empty())
}

#[derive(Deserialize)]
struct ConversationFile {
    messages: Vec<Message>,
    model: String,
    #[serde(default, with = "crate::utils::time")]
    last_message_time: Option<OffsetDateTime>,
}

impl TryFrom<ConversationFile> for Conversation {
    type Error = String;

    fn try_from(file: ConversationFile) -> Result<Self, Self::Error> {
        match file.messages.first() {
            Some(first) if first.role == MessageRole::System => {}
            Some(_) => return Err("first message must be the system prompt".to_string()),
            None => return Err("conversation has no messages".to_string()),
        }
        if file.messages[1..]
            .iter()
            .any(|message| message.role == MessageRole::System)
        {
            return Err("conversation has more than one system message".to_string());
        }
        if split_model(&file.model).is_none() {
            return Err(format!(
                "model '{}' is not of the form provider/model",
                file.model
            ));
        }
        Ok(Conversation {
            messages: file.messages,
            model: file.model,
            last_message_time: file.last_message_time,
        })
    }
}
