use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message as held in the session and sent to the message store.
///
/// Messages are created with a locally generated temporary `id`. Once the
/// message store has persisted them, the session swaps that id for the
/// server-assigned one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub owner: String,
}

impl Message {
    /// Create a message carrying a fresh temporary identifier
    pub fn new(chat: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: temporary_id(),
            chat: chat.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            owner: String::new(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Role/content pair used in generation and title requests
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Wire form of a message for the generation and title services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Generate a locally unique provisional identifier
pub fn temporary_id() -> String {
    Uuid::new_v4().to_string()
}
