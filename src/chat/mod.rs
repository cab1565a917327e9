//! Interactive chat built on the streaming completion client.
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and YAML configuration
//! - [`session`]: the session loop's per-line logic and turn execution
//! - [`commands`]: slash command parsing and completion

pub mod commands;
pub mod config;
pub mod interrupt;
pub mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{
    COMMAND_PREFIX, COMMANDS, ChatCommand, complete_command, help_entries, help_preamble,
    parse_command,
};
pub use config::{ChatArgs, ChatConfig, DEFAULT_CONFIG_FILE};
pub use interrupt::Interrupt;
pub use session::{ChatSession, Outcome};
