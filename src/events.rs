use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a turn in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Terminal input forwarded to the UI loop
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(crossterm::event::KeyEvent),

    /// Paste event
    Paste(String),

    /// Terminal resize
    Resize(u16, u16),
}

/// Requests raised by the conversation UI for the application loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Submit text to the ingestion controller
    Submit { text: String },

    /// Re-fetch the model list
    RefreshModels,

    /// Change the selected model
    SelectModel { id: String },

    /// Export the current transcript
    Export,

    /// Request to exit the application
    ExitRequest,

    /// Show error message
    ShowError { message: String },

    /// Show info message
    ShowInfo { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"assistant\"").unwrap(),
            Role::Assistant
        );
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
