//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to inspect and change the session without sending
//! messages to the backend.

/// The prefix that marks a line as a command.
pub const COMMAND_PREFIX: char = '/';

/// Commands offered by tab completion.
pub const COMMANDS: &[&str] = &[
    "/prompt",
    "/conversation",
    "/provider",
    "/delete",
    "/clear",
    "/debug",
    "/bye",
];

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show the current system prompt.
    ShowPrompt,

    /// Replace the conversation with a new system prompt.
    SetPrompt(String),

    /// Print the user and assistant messages.
    ShowConversation,

    /// Show the current provider/model.
    ShowProvider,

    /// Switch to another provider.
    SetProvider(String),

    /// Delete the persisted conversation and start over.
    Delete,

    /// Clear the terminal.
    Clear,

    /// Toggle debug output.
    Debug,

    /// Exit the chat application.
    Bye,

    /// Display help information.
    Help,

    /// A command word that is not recognized.
    Unknown(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input starts with `/`, or `None` if it
/// should be treated as a chat message. The command word is case-insensitive;
/// arguments keep their case. Arguments to commands that take none are
/// ignored.
///
/// # Examples
///
/// ```
/// # use palaver::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/bye"), Some(ChatCommand::Bye));
/// assert_eq!(
///     parse_command("/provider ollama"),
///     Some(ChatCommand::SetProvider("ollama".to_string()))
/// );
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim().strip_prefix(COMMAND_PREFIX)?;

    let mut tokens = input.split_whitespace();
    let Some(command) = tokens.next() else {
        return Some(ChatCommand::Unknown(String::new()));
    };
    let args: Vec<&str> = tokens.collect();

    let result = match command.to_lowercase().as_str() {
        "prompt" if args.is_empty() => ChatCommand::ShowPrompt,
        "prompt" => ChatCommand::SetPrompt(args.join(" ")),
        "conversation" => ChatCommand::ShowConversation,
        "provider" => match args.first() {
            Some(name) => ChatCommand::SetProvider(name.to_string()),
            None => ChatCommand::ShowProvider,
        },
        "delete" => ChatCommand::Delete,
        "clear" => ChatCommand::Clear,
        "debug" => ChatCommand::Debug,
        "bye" => ChatCommand::Bye,
        "?" => ChatCommand::Help,
        other => ChatCommand::Unknown(other.to_string()),
    };

    Some(result)
}

/// Returns the commands that complete `prefix`, ignoring case.
///
/// Only the command word completes; once the line holds a space there is
/// nothing to offer.
pub fn complete_command(prefix: &str) -> Vec<&'static str> {
    if !prefix.starts_with(COMMAND_PREFIX) || prefix.contains(char::is_whitespace) {
        return Vec::new();
    }
    let prefix = prefix.to_lowercase();
    COMMANDS
        .iter()
        .copied()
        .filter(|command| command.starts_with(&prefix))
        .collect()
}

/// Returns the command reference as `(command, description)` pairs.
pub fn help_entries() -> &'static [(&'static str, &'static str)] {
    &[
        ("/prompt", "Show or change the prompt."),
        ("/conversation", "Show the current conversation."),
        ("/provider", "Show or change the provider and model."),
        ("/delete", "Delete the current conversation."),
        ("/clear", "Clear the terminal screen."),
        ("/debug", "Toggle debug mode."),
        ("/bye", "Exit the program. Same as Ctrl+C."),
    ]
}

/// Returns the preamble printed before the command list.
pub fn help_preamble() -> &'static str {
    "These settings will apply only to the current session.\n\
     To change the default settings, edit the config.yaml file."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bye() {
        assert_eq!(parse_command("/bye"), Some(ChatCommand::Bye));
        assert_eq!(parse_command("  /BYE  "), Some(ChatCommand::Bye));
    }

    #[test]
    fn parse_prompt() {
        assert_eq!(parse_command("/prompt"), Some(ChatCommand::ShowPrompt));
        assert_eq!(
            parse_command("/Prompt You are   a Pirate"),
            Some(ChatCommand::SetPrompt("You are a Pirate".to_string()))
        );
    }

    #[test]
    fn parse_provider() {
        assert_eq!(parse_command("/provider"), Some(ChatCommand::ShowProvider));
        assert_eq!(
            parse_command("/provider ollama extra"),
            Some(ChatCommand::SetProvider("ollama".to_string()))
        );
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(
            parse_command("/conversation"),
            Some(ChatCommand::ShowConversation)
        );
        assert_eq!(parse_command("/delete"), Some(ChatCommand::Delete));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/debug"), Some(ChatCommand::Debug));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/delete now"), Some(ChatCommand::Delete));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            parse_command("/model gpt-4o"),
            Some(ChatCommand::Unknown("model".to_string()))
        );
        assert_eq!(
            parse_command("/"),
            Some(ChatCommand::Unknown(String::new()))
        );
        assert_eq!(
            parse_command("/   "),
            Some(ChatCommand::Unknown(String::new()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there"), None);
        assert_eq!(parse_command("what is 1/2?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn completion() {
        assert_eq!(complete_command("/pr"), vec!["/prompt", "/provider"]);
        assert_eq!(complete_command("/C"), vec!["/conversation", "/clear"]);
        assert_eq!(complete_command("/"), COMMANDS.to_vec());
        assert!(complete_command("/prompt x").is_empty());
        assert!(complete_command("hello").is_empty());
    }

    #[test]
    fn help_covers_every_command() {
        let entries = help_entries();
        for command in COMMANDS {
            assert!(entries.iter().any(|(name, _)| name == command));
        }
        assert!(help_preamble().contains("config.yaml"));
    }
}
