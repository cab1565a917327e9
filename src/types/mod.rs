// Public modules
pub mod completion_chunk;
pub mod conversation;
pub mod message;
pub mod provider_entry;

// Re-exports
pub use completion_chunk::{ChunkMessage, CompletionChunk, DeltaChoice};
pub use conversation::{Conversation, split_model};
pub use message::{Message, MessageRole};
pub use provider_entry::ProviderEntry;
