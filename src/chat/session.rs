//! Core chat session management.
//!
//! This module provides the [`ChatSession`] struct, which owns the
//! conversation and drives both slash commands and streamed chat turns.
//! Nothing in here exits the process: every entry point returns an
//! [`Outcome`] for the caller to act on.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use crate::chat::commands::{ChatCommand, help_entries, help_preamble, parse_command};
use crate::chat::config::ChatConfig;
use crate::chat::interrupt::Interrupt;
use crate::client::{CompletionClient, CompletionRequest, HttpCompletionClient};
use crate::error::{Error, Result};
use crate::observability::{
    COMMANDS, STREAM_BYTES, STREAM_DURATION, STREAM_ERRORS, STREAM_FRAGMENTS, TURNS_COMPLETED,
    TURNS_FAILED, TURNS_STARTED, UNKNOWN_COMMANDS,
};
use crate::registry::ProviderRegistry;
use crate::render::Renderer;
use crate::store::{ConversationStore, LoadStatus};
use crate::types::Conversation;

const RESPONSE_HINT: &str = "Error while processing response. Make sure the API key is correct and the model exists.\n\
                             If you are using Ollama, make sure it is running.\n\
                             For more details, enable debug mode.";

/// What the session loop should do after handling one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Read the next line.
    Continue,
    /// Stop with a success status.
    ExitSuccess,
    /// Stop with a failure status.
    ExitFailure,
}

impl Outcome {
    /// Returns true if the loop should stop.
    pub fn is_exit(self) -> bool {
        !matches!(self, Outcome::Continue)
    }

    /// Returns the process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Continue | Outcome::ExitSuccess => 0,
            Outcome::ExitFailure => 1,
        }
    }
}

/// A chat session that manages conversation state and backend interactions.
pub struct ChatSession<C: CompletionClient = HttpCompletionClient> {
    client: C,
    registry: ProviderRegistry,
    store: ConversationStore,
    conversation: Conversation,
    debug: bool,
    interrupt: Option<Arc<Interrupt>>,
}

impl<C: CompletionClient> ChatSession<C> {
    /// Opens a session, restoring the persisted conversation if there is one.
    ///
    /// Load problems never fail the session; they are reported through the
    /// renderer and a fresh conversation is used instead.
    pub fn open(config: &ChatConfig, client: C, renderer: &mut dyn Renderer) -> Result<Self> {
        let store = config.store()?;
        let loaded = store.load();
        let debug = config.debug;
        match &loaded.status {
            LoadStatus::Restored | LoadStatus::Fresh => {}
            LoadStatus::Expired => {
                renderer.print_notice("Conversation expired. Starting a new one.");
            }
            LoadStatus::Corrupt(err) => {
                renderer.print_error("Error: Could not read conversation file.");
                if debug {
                    renderer.print_error(&err.to_string());
                }
            }
            LoadStatus::Unreadable(err) => {
                renderer.print_error("Error while loading conversation file.");
                if debug {
                    renderer.print_error(&err.to_string());
                }
            }
        }
        Ok(Self::with_parts(
            client,
            config.registry(),
            store,
            loaded.conversation,
            debug,
        ))
    }

    /// Assembles a session from already-built parts.
    pub fn with_parts(
        client: C,
        registry: ProviderRegistry,
        store: ConversationStore,
        conversation: Conversation,
        debug: bool,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            conversation,
            debug,
            interrupt: None,
        }
    }

    /// Attaches the interrupt that aborts an in-flight response.
    ///
    /// An interrupted response ends the session with success, the same as
    /// `/bye`; nothing from the interrupted turn is persisted.
    pub fn with_interrupt(mut self, interrupt: Arc<Interrupt>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Returns the conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns whether error causes are shown.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns the provider registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Returns the conversation store.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handles one line of user input.
    pub async fn handle_line(&mut self, line: &str, renderer: &mut dyn Renderer) -> Outcome {
        let line = line.trim();
        if line.is_empty() {
            return Outcome::Continue;
        }
        match parse_command(line) {
            Some(command) => self.dispatch(command, renderer),
            None => self.send_streaming(line, renderer).await,
        }
    }

    /// Applies a slash command.
    pub fn dispatch(&mut self, command: ChatCommand, renderer: &mut dyn Renderer) -> Outcome {
        COMMANDS.click();
        match command {
            ChatCommand::ShowPrompt => {
                renderer.print_value("Current prompt", self.conversation.system_prompt());
            }
            ChatCommand::SetPrompt(prompt) => {
                renderer.print_value("Set prompt to", &prompt);
                self.conversation.replace_prompt(prompt);
            }
            ChatCommand::ShowConversation => {
                let turns = self.conversation.turns();
                if turns.is_empty() {
                    renderer.print_info("No messages in conversation.");
                }
                for message in turns {
                    let role = message.role.as_str().to_uppercase();
                    renderer.print_message(&role, &message.content);
                }
            }
            ChatCommand::ShowProvider => {
                renderer.print_value("Current provider / model", self.conversation.model());
            }
            ChatCommand::SetProvider(name) => match self.registry.qualified_model(&name) {
                Ok(model) => {
                    tracing::debug!(provider = %name, %model, "switching provider");
                    self.conversation.set_model(model);
                    renderer.print_value("Set provider / model to", self.conversation.model());
                }
                Err(err) if err.is_unknown_provider() => {
                    renderer.print_value(
                        "Unsupported provider. Supported providers are",
                        &self.registry.names().join(", "),
                    );
                }
                Err(err) => {
                    renderer.print_error("Could not switch provider.");
                    self.print_cause(renderer, &err);
                }
            },
            ChatCommand::Delete => {
                if let Err(err) = self.store.delete() {
                    renderer.print_error("Error while deleting conversation file.");
                    self.print_cause(renderer, &err);
                }
                let model = self.conversation.model().to_string();
                self.conversation = self.store.fresh();
                self.conversation.set_model(model);
                renderer.print_info("Conversation deleted.");
            }
            ChatCommand::Clear => renderer.clear_screen(),
            ChatCommand::Debug => {
                self.debug = !self.debug;
                renderer.print_value("Debug mode", if self.debug { "on" } else { "off" });
            }
            ChatCommand::Bye => return Outcome::ExitSuccess,
            ChatCommand::Help => {
                renderer.print_notice(help_preamble());
                for (name, description) in help_entries() {
                    renderer.print_help_entry(name, description);
                }
            }
            ChatCommand::Unknown(word) => {
                UNKNOWN_COMMANDS.click();
                tracing::debug!(command = %word, "unknown command");
                renderer.print_info("Unknown command. Use /? for help.");
            }
        }
        Outcome::Continue
    }

    /// Sends a user message and streams the reply.
    ///
    /// On success the reply is appended and the conversation saved. On a
    /// backend failure the user message stays in memory, nothing is saved,
    /// and the outcome is [`Outcome::ExitFailure`].
    pub async fn send_streaming(&mut self, content: &str, renderer: &mut dyn Renderer) -> Outcome {
        let provider = self.conversation.provider().to_string();
        let entry = match self.registry.resolve(&provider) {
            Ok(entry) => entry.clone(),
            Err(err) => {
                renderer.print_error(&format!("{err}. Use /provider to pick one."));
                return Outcome::Continue;
            }
        };

        TURNS_STARTED.click();
        self.conversation.push_user(content);
        let request = CompletionRequest::new(
            self.conversation.model(),
            &entry,
            self.conversation.messages(),
        );

        let start = Instant::now();
        let reply = match self.collect_reply(request, renderer).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                renderer.print_interrupted();
                return Outcome::ExitSuccess;
            }
            Err(err) => {
                TURNS_FAILED.click();
                STREAM_ERRORS.click();
                tracing::debug!(error = %err, "completion stream failed");
                renderer.finish_response();
                renderer.print_error(RESPONSE_HINT);
                self.print_cause(renderer, &err);
                return Outcome::ExitFailure;
            }
        };
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        renderer.finish_response();
        TURNS_COMPLETED.click();

        self.conversation.push_assistant(reply);
        self.save(renderer)
    }

    /// Streams fragments to the renderer, returning the assembled reply, or
    /// `None` if the user interrupted.
    async fn collect_reply(
        &self,
        request: CompletionRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<Option<String>> {
        let _in_flight = self.interrupt.as_deref().map(Interrupt::begin);
        let interrupted = async {
            match self.interrupt.as_deref() {
                Some(interrupt) => interrupt.wait().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(interrupted);

        let mut stream = tokio::select! {
            stream = self.client.stream(request) => stream?,
            _ = &mut interrupted => return Ok(None),
        };
        let mut reply = String::new();
        loop {
            let fragment = tokio::select! {
                fragment = stream.next() => fragment,
                _ = &mut interrupted => return Ok(None),
            };
            let Some(fragment) = fragment else {
                break;
            };
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            STREAM_FRAGMENTS.click();
            STREAM_BYTES.count(fragment.len() as u64);
            renderer.print_fragment(&fragment);
            reply.push_str(&fragment);
        }
        Ok(Some(reply))
    }

    fn save(&mut self, renderer: &mut dyn Renderer) -> Outcome {
        match self.store.save(&mut self.conversation) {
            Ok(()) => Outcome::Continue,
            Err(err) if err.io_kind() == Some(std::io::ErrorKind::NotFound) => {
                renderer.print_error("Error: Could not save conversation file.");
                self.print_cause(renderer, &err);
                Outcome::Continue
            }
            Err(err) => {
                renderer.print_error("Error while saving conversation file.");
                self.print_cause(renderer, &err);
                Outcome::ExitFailure
            }
        }
    }

    fn print_cause(&self, renderer: &mut dyn Renderer, err: &Error) {
        if self.debug {
            renderer.print_error(&err.to_string());
        }
    }
}
