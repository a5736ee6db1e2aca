use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::models::{
    CancellationController, Conversation, ConversationsStore, Message, SessionEvent, TurnPhase,
};
use crate::services::{
    ApiClient, GenerationService, HttpGenerationService, HttpMessageStore, HttpTitleService,
    MessageStore, ServiceResult, TitleService,
};
use crate::settings::{EngineConfig, KeyStore};

/// Capacity of the session event channel. Slow subscribers lag rather than
/// block the turn.
const EVENT_CAPACITY: usize = 256;

/// The external collaborators a session talks to
#[derive(Clone)]
pub struct SessionServices {
    pub generation: Arc<dyn GenerationService>,
    pub titles: Arc<dyn TitleService>,
    pub messages: Arc<dyn MessageStore>,
}

impl SessionServices {
    /// HTTP-backed services rooted at `config.base_url`
    pub fn http(config: &EngineConfig) -> ServiceResult<Self> {
        let client = ApiClient::new(config.base_url.clone())?;
        Ok(Self {
            generation: Arc::new(HttpGenerationService::new(
                client.clone(),
                config.generate_path.clone(),
            )),
            titles: Arc::new(HttpTitleService::new(
                client.clone(),
                config.title_path.clone(),
            )),
            messages: Arc::new(HttpMessageStore::new(client, config.message_path.clone())),
        })
    }
}

/// Context object for one chat session.
///
/// Owns the conversation state, the key store, the cancellation controller
/// and the collaborating services. Every entry point takes `&self`, so the
/// session is typically shared as `Arc<ChatSession>` between the task running
/// a turn and the task that may cancel it. Locks are only ever taken for
/// short synchronous sections, never across an await.
pub struct ChatSession {
    pub(crate) store: Mutex<ConversationsStore>,
    key_store: KeyStore,
    cancellation: CancellationController,
    pub(crate) services: SessionServices,
    config: EngineConfig,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    pub fn new(config: EngineConfig, key_store: KeyStore, services: SessionServices) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store: Mutex::new(ConversationsStore::new()),
            key_store,
            cancellation: CancellationController::new(),
            services,
            config,
            events,
        }
    }

    /// Session wired to the HTTP services described by `config`
    pub fn connect(config: EngineConfig, key_store: KeyStore) -> ServiceResult<Self> {
        let services = SessionServices::http(&config)?;
        info!(base_url = %config.base_url, "Chat session connected");
        Ok(Self::new(config, key_store, services))
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationController {
        &self.cancellation
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.store.lock().conversations().to_vec()
    }

    pub fn active_conversation(&self) -> Option<Conversation> {
        self.store.lock().active_conversation().cloned()
    }

    /// Id of the active conversation, empty when none is open
    pub fn active_chat_id(&self) -> String {
        self.store
            .lock()
            .active_id()
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.lock().messages().to_vec()
    }

    pub fn has_messages(&self) -> bool {
        self.store.lock().has_messages()
    }

    pub fn input(&self) -> String {
        self.store.lock().input().to_string()
    }

    /// Whether a turn is in flight
    pub fn is_handling(&self) -> bool {
        self.cancellation.is_handling()
    }

    pub fn phase(&self) -> TurnPhase {
        self.cancellation.phase()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.store.lock().set_input(input.into());
    }

    /// Replace the conversation list. No-op while a turn is in flight.
    pub fn set_conversations(&self, conversations: Vec<Conversation>) -> bool {
        if self.is_handling() {
            debug!("Turn in flight; ignoring conversation list update");
            return false;
        }
        self.store.lock().set_conversations(conversations);
        true
    }

    /// Add a conversation at the top of the list. No-op while a turn is in flight.
    pub fn add_conversation(&self, conversation: Conversation) -> bool {
        if self.is_handling() {
            debug!("Turn in flight; ignoring new conversation");
            return false;
        }
        self.store.lock().add_conversation(conversation);
        true
    }

    /// Make `id` the active conversation with the given messages.
    /// No-op while a turn is in flight.
    pub fn open_conversation(&self, id: Option<String>, messages: Vec<Message>) -> bool {
        if self.is_handling() {
            debug!("Turn in flight; ignoring conversation switch");
            return false;
        }
        debug!(conversation_id = ?id, count = messages.len(), "Opening conversation");
        self.store.lock().set_active(id, messages);
        true
    }

    /// Abort the in-flight generation, if any, and reset for the next turn
    pub fn cancel_turn(&self) {
        info!("Cancelling turn");
        self.cancellation.cancel();
    }
}
