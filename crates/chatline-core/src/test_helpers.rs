/// Shared test helpers for session and controller tests.
///
/// Provides scripted in-memory stand-ins for the three external services and
/// a `harness` that wires them into a `ChatSession` with a key configured and
/// an empty active conversation `chat-1`.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Notify;

use crate::controllers::{ChatSession, SessionServices};
use crate::models::{Conversation, Message};
use crate::repositories::{BoxFuture, InMemoryApiKeyRepository};
use crate::services::{
    GenerationRequest, GenerationService, MessageStore, ServiceError, ServiceResult, TextStream,
    TitleRequest, TitleService,
};
use crate::settings::{EngineConfig, KeyStore};

/// How the mock generation service answers one request
pub enum Script {
    /// Yield every chunk, then end
    Chunks(Vec<&'static str>),
    /// Yield `before`, wait for `gate`, yield `after`, then end
    Gated {
        before: Vec<&'static str>,
        gate: Arc<Notify>,
        after: Vec<&'static str>,
    },
    /// Yield every chunk, then never finish
    Hang(Vec<&'static str>),
    /// Reject the request with this status
    Fail(u16),
    /// Yield every chunk, then fail the read
    FailAfter(Vec<&'static str>),
}

impl Script {
    pub fn chunks(chunks: &[&'static str]) -> Self {
        Self::Chunks(chunks.to_vec())
    }

    pub fn gated(before: &[&'static str], gate: Arc<Notify>, after: &[&'static str]) -> Self {
        Self::Gated {
            before: before.to_vec(),
            gate,
            after: after.to_vec(),
        }
    }

    pub fn hang(chunks: &[&'static str]) -> Self {
        Self::Hang(chunks.to_vec())
    }
}

fn ok_chunks(chunks: Vec<&'static str>) -> impl futures::Stream<Item = ServiceResult<String>> {
    stream::iter(chunks.into_iter().map(|c| Ok(c.to_string())))
}

/// Generation service that plays back one `Script` per request.
/// Requests beyond the scripted ones get an empty reply.
pub struct MockGenerationService {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerationService {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl GenerationService for MockGenerationService {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'static, ServiceResult<TextStream>> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Chunks(Vec::new()));

        Box::pin(async move {
            let stream: TextStream = match script {
                Script::Chunks(chunks) => ok_chunks(chunks).boxed(),
                Script::Gated {
                    before,
                    gate,
                    after,
                } => async_stream::stream! {
                    for chunk in before {
                        yield Ok::<_, ServiceError>(chunk.to_string());
                    }
                    gate.notified().await;
                    for chunk in after {
                        yield Ok::<_, ServiceError>(chunk.to_string());
                    }
                }
                .boxed(),
                Script::Hang(chunks) => ok_chunks(chunks).chain(stream::pending()).boxed(),
                Script::Fail(status) => {
                    return Err(ServiceError::Status {
                        status,
                        body: "mock failure".to_string(),
                    });
                }
                Script::FailAfter(chunks) => ok_chunks(chunks)
                    .chain(stream::iter(vec![Err(ServiceError::Status {
                        status: 502,
                        body: "connection reset".to_string(),
                    })]))
                    .boxed(),
            };
            Ok(stream)
        })
    }
}

/// Message store that records every call and assigns `persisted-N` ids
pub struct MockMessageStore {
    inserted: Mutex<Vec<Vec<Message>>>,
    retracted: Mutex<Vec<Message>>,
    failing: Mutex<bool>,
    next_id: Mutex<usize>,
    retract_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockMessageStore {
    pub fn new() -> Self {
        Self {
            inserted: Mutex::new(Vec::new()),
            retracted: Mutex::new(Vec::new()),
            failing: Mutex::new(false),
            next_id: Mutex::new(1),
            retract_gate: Mutex::new(None),
        }
    }

    /// Make every subsequent call fail. Calls are still recorded.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Make `retract` wait for `gate` before answering
    pub fn gate_retract(&self, gate: Arc<Notify>) {
        *self.retract_gate.lock().unwrap() = Some(gate);
    }

    pub fn inserted(&self) -> Vec<Vec<Message>> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn retracted(&self) -> Vec<Message> {
        self.retracted.lock().unwrap().clone()
    }

    fn failure() -> ServiceError {
        ServiceError::Status {
            status: 500,
            body: "store unavailable".to_string(),
        }
    }
}

impl MessageStore for MockMessageStore {
    fn insert(&self, messages: Vec<Message>) -> BoxFuture<'static, ServiceResult<Vec<Message>>> {
        self.inserted.lock().unwrap().push(messages.clone());
        let result = if *self.failing.lock().unwrap() {
            Err(Self::failure())
        } else {
            let mut next_id = self.next_id.lock().unwrap();
            Ok(messages
                .into_iter()
                .map(|m| {
                    let id = format!("persisted-{}", *next_id);
                    *next_id += 1;
                    Message { id, ..m }
                })
                .collect())
        };
        Box::pin(async move { result })
    }

    fn retract(&self, message: Message) -> BoxFuture<'static, ServiceResult<()>> {
        self.retracted.lock().unwrap().push(message);
        let result = if *self.failing.lock().unwrap() {
            Err(Self::failure())
        } else {
            Ok(())
        };
        let gate = self.retract_gate.lock().unwrap().clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        })
    }
}

enum TitleReply {
    Title(Option<String>),
    Fail,
}

/// Title service with a configurable reply. Answers `None` by default.
pub struct MockTitleService {
    reply: Mutex<TitleReply>,
    requests: Mutex<Vec<TitleRequest>>,
}

impl MockTitleService {
    pub fn new() -> Self {
        Self {
            reply: Mutex::new(TitleReply::Title(None)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_with(&self, title: Option<&str>) {
        *self.reply.lock().unwrap() = TitleReply::Title(title.map(str::to_string));
    }

    pub fn fail(&self) {
        *self.reply.lock().unwrap() = TitleReply::Fail;
    }

    pub fn requests(&self) -> Vec<TitleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TitleService for MockTitleService {
    fn generate_title(&self, request: TitleRequest) -> BoxFuture<'static, ServiceResult<Option<String>>> {
        self.requests.lock().unwrap().push(request);
        let result = match &*self.reply.lock().unwrap() {
            TitleReply::Title(title) => Ok(title.clone()),
            TitleReply::Fail => Err(ServiceError::EmptyBody),
        };
        Box::pin(async move { result })
    }
}

pub struct Harness {
    pub session: Arc<ChatSession>,
    pub generation: Arc<MockGenerationService>,
    pub titles: Arc<MockTitleService>,
    pub message_store: Arc<MockMessageStore>,
}

/// Session with key `sk-test` and the empty conversation `chat-1` open
pub async fn harness(scripts: Vec<Script>) -> Harness {
    let generation = Arc::new(MockGenerationService::new(scripts));
    let titles = Arc::new(MockTitleService::new());
    let message_store = Arc::new(MockMessageStore::new());

    let key_store = KeyStore::new(Arc::new(InMemoryApiKeyRepository::with_key("sk-test")));
    key_store.load().await;

    let services = SessionServices {
        generation: generation.clone(),
        titles: titles.clone(),
        messages: message_store.clone(),
    };
    let session = Arc::new(ChatSession::new(EngineConfig::default(), key_store, services));
    session.add_conversation(Conversation::new("chat-1"));
    session.open_conversation(Some("chat-1".to_string()), Vec::new());

    Harness {
        session,
        generation,
        titles,
        message_store,
    }
}

/// Yield to spawned tasks until `condition` holds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
