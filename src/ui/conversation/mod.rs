//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod streaming;

pub use commands::{get_help_text, ParsedCommand, SlashCommand};
pub use composer::{Composer, ComposerResult};
pub use history::TranscriptView;
pub use manager::{ConversationManager, ViewContext};
pub use streaming::{StatusMessage, StatusType, StreamingIndicator};
