//! Chat history sink: user messages and model replies, append-only.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::diagnostics::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "you"),
            Role::Model => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Default)]
pub struct ChatLog {
    history: Vec<ChatMessage>,
    /// When set, new messages are also forwarded here for display.
    tap: Option<mpsc::UnboundedSender<ChatMessage>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tap(tap: mpsc::UnboundedSender<ChatMessage>) -> Self {
        Self {
            history: Vec::new(),
            tap: Some(tap),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Role::User, text.into());
    }

    /// Record a model reply verbatim.
    pub fn push_model(&mut self, text: impl Into<String>) {
        self.push(Role::Model, text.into());
    }

    fn push(&mut self, role: Role, text: String) {
        let msg = ChatMessage {
            role,
            text,
            timestamp_ms: now_ms(),
        };
        if let Some(tap) = &self.tap {
            let _ = tap.send(msg.clone());
        }
        self.history.push(msg);
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
