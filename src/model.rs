//! Common data models shared by every dialect.

use serde::{Deserialize, Serialize};

/// Role of the message sender.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
///
/// Supplied by the caller in order; the normalizer only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Lifecycle marker kind carried by [`Delta::Event`].
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    End,
    Error,
}

/// One unit of normalized output.
///
/// Emission order equals the logical order of the generated text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Delta {
    /// User-facing answer text
    Token { value: String },

    /// Model-internal reasoning text
    Thinking { value: String },

    /// Lifecycle marker
    Event { event: EventKind, value: String },
}

impl Delta {
    pub fn token(value: impl Into<String>) -> Self {
        Delta::Token {
            value: value.into(),
        }
    }

    pub fn thinking(value: impl Into<String>) -> Self {
        Delta::Thinking {
            value: value.into(),
        }
    }

    pub fn start() -> Self {
        Delta::Event {
            event: EventKind::Start,
            value: String::new(),
        }
    }

    pub fn end() -> Self {
        Delta::Event {
            event: EventKind::End,
            value: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Delta::Event {
            event: EventKind::Error,
            value: message.into(),
        }
    }

    /// Whether this delta closes the sequence (`end` or `error`).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Delta::Event {
                event: EventKind::End | EventKind::Error,
                ..
            }
        )
    }
}

/// Classification a dialect extractor gives to raw content.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    Plain,
    Reasoning,
}

/// Raw content produced by a dialect extractor, before inline marker scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Plain,
            text: text.into(),
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Reasoning,
            text: text.into(),
        }
    }
}
