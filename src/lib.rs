//! palaver: a persistent, multi-provider streaming chat REPL.
//!
//! The library holds everything but the terminal loop, so sessions can be
//! driven from tests with scripted backends and recording renderers.

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod registry;
pub mod render;
pub mod sse;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{CompletionClient, CompletionRequest, FragmentStream, HttpCompletionClient};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use registry::ProviderRegistry;
pub use store::{ConversationStore, LoadStatus, Loaded};
pub use types::*;
