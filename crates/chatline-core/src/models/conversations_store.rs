use std::collections::HashMap;

use super::conversation::Conversation;
use super::message::{ChatMessage, Message, Role};

/// Conversation state for one chat session.
///
/// Holds the ordered conversation list, the active conversation id, the
/// ordered messages of the active conversation and the input buffer. The
/// store itself has no locking; `ChatSession` wraps it in a mutex and never
/// holds the lock across an await.
#[derive(Debug, Default)]
pub struct ConversationsStore {
    conversations: Vec<Conversation>,
    active_conversation_id: Option<String>,
    messages: Vec<Message>,
    input: String,
}

impl ConversationsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the conversation list, keeping the caller's order
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Add a conversation to the front of the list, replacing one with the same id
    pub fn add_conversation(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation);
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get_conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Set the active conversation and load its messages
    pub fn set_active(&mut self, id: Option<String>, messages: Vec<Message>) {
        self.active_conversation_id = id;
        self.messages = messages;
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_conversation_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id().and_then(|id| self.get_conversation(id))
    }

    /// Update a conversation's title. Returns false if no such conversation.
    pub fn set_title(&mut self, id: &str, title: String) -> bool {
        match self.conversations.iter_mut().find(|c| c.id == id) {
            Some(conv) => {
                conv.title = Some(title);
                true
            }
            None => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn find_message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append streamed text to a message. Returns false if the message is gone.
    pub fn append_to_message(&mut self, id: &str, text: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Overwrite a message's content. Returns false if the message is gone.
    pub fn replace_content(&mut self, id: &str, content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove the last message if, and only if, it was written by the assistant
    pub fn pop_trailing_assistant(&mut self) -> Option<Message> {
        if self.last_role() == Some(Role::Assistant) {
            self.messages.pop()
        } else {
            None
        }
    }

    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// Swap provisional ids for canonical ones in a single pass.
    ///
    /// Only ids are touched; content and order stay as they are. Returns the
    /// number of messages updated.
    pub fn replace_ids(&mut self, mapping: &HashMap<String, String>) -> usize {
        let mut replaced = 0;
        for message in self.messages.iter_mut() {
            if let Some(canonical) = mapping.get(&message.id) {
                message.id = canonical.clone();
                replaced += 1;
            }
        }
        replaced
    }

    /// Message history as role/content pairs
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }
}
