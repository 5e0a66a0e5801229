use dt_core::project::ProjectState;
use dt_core::types::Role;
use serde::{Deserialize, Serialize};

// ─── WireMessage ──────────────────────────────────────────────────────────

/// A chat entry as the coach endpoint sees it: role and text only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─── ChatRequest ──────────────────────────────────────────────────────────

/// Body of `POST <endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
    pub project_state: ProjectState,
}

impl ChatRequest {
    /// The whole chat history plus the full project state.
    pub fn from_state(state: &ProjectState) -> Self {
        Self {
            messages: state
                .chat_history
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            project_state: state.clone(),
        }
    }

    /// Append a message that is sent but never stored in the history.
    pub fn with_extra(mut self, message: WireMessage) -> Self {
        self.messages.push(message);
        self
    }
}
