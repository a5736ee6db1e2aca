use chrono::Local;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::chat_session::ChatSession;
use crate::models::{
    CancellationController, ChatMessage, Message, Role, SessionEvent, SkipReason, TurnAction,
    TurnOutcome, TurnPhase, TurnTicket,
};
use crate::services::{
    GenerationRequest, ServiceError, ServiceResult, TitleRequest, clean_title, reconcile_ids,
};

const MIN_INPUT_CHARS: usize = 2;
const FORMAT_DIRECTIVE: &str = "Answer as concisely as possible and ALWAYS answer in MARKDOWN.";

/// Holds the in-flight flag for one turn.
///
/// Dropping it releases the flag and returns the phase to `Idle`, so a turn
/// whose future is dropped mid-await cannot wedge the session.
pub(super) struct InFlightGuard<'a> {
    cancellation: &'a CancellationController,
    ticket: TurnTicket,
}

impl<'a> InFlightGuard<'a> {
    /// Claim the in-flight flag, or `None` if another turn holds it
    pub(super) fn acquire(cancellation: &'a CancellationController) -> Option<Self> {
        cancellation
            .begin_turn()
            .map(|ticket| Self { cancellation, ticket })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.cancellation.finish_turn(&self.ticket);
        self.cancellation.advance(&self.ticket, TurnPhase::Idle);
    }
}

impl ChatSession {
    /// Run one turn: stage messages, stream the reply, persist and title.
    ///
    /// Never returns an error. Precondition failures come back as
    /// `TurnOutcome::Skipped` with nothing touched; generation failures leave
    /// the fallback text in the assistant message.
    pub async fn submit_turn(&self, action: TurnAction) -> TurnOutcome {
        let api_key = self.key_store().get();
        if let Some(reason) = self.check_preconditions(action, &api_key) {
            debug!(?action, ?reason, "Turn skipped");
            return TurnOutcome::Skipped(reason);
        }

        // The check above is advisory; this is the atomic check-and-set
        let Some(guard) = InFlightGuard::acquire(self.cancellation()) else {
            debug!(?action, "Turn skipped; another turn won the race");
            return TurnOutcome::Skipped(SkipReason::TurnInFlight);
        };
        self.run_turn(guard, action, api_key).await
    }

    /// Body of a turn whose in-flight flag is already held by `guard`
    pub(super) async fn run_turn(
        &self,
        guard: InFlightGuard<'_>,
        action: TurnAction,
        api_key: String,
    ) -> TurnOutcome {
        let ticket = &guard.ticket;
        info!(?action, "Turn submitted");

        let user_message = self.stage_user_message(action, ticket);
        let reply_id = self.stage_placeholder();
        let request = self.build_generation_request(api_key.clone(), &reply_id);

        let outcome = match self.stream_reply(request, &reply_id, ticket).await {
            Ok(chunks) => {
                info!(chunks, "Reply streamed");
                TurnOutcome::Completed
            }
            Err(ServiceError::Cancelled) => {
                info!("Turn cancelled; keeping partial reply");
                self.cancellation().advance(ticket, TurnPhase::Aborted);
                if self.reply_is_empty(&reply_id) {
                    self.write_fallback(&reply_id);
                }
                TurnOutcome::Cancelled
            }
            Err(e) => {
                error!(error = %e, "Generation failed");
                self.cancellation().advance(ticket, TurnPhase::Failed);
                self.write_fallback(&reply_id);
                TurnOutcome::Failed(e.to_string())
            }
        };

        self.finalize_turn(ticket, user_message, &reply_id).await;
        if action == TurnAction::Generate {
            self.derive_title(&api_key).await;
        }

        drop(guard);
        self.emit(SessionEvent::TurnFinished {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn check_preconditions(&self, action: TurnAction, api_key: &str) -> Option<SkipReason> {
        if self.is_handling() {
            return Some(SkipReason::TurnInFlight);
        }
        if action == TurnAction::Generate
            && self.store.lock().input().chars().count() < MIN_INPUT_CHARS
        {
            return Some(SkipReason::InputTooShort);
        }
        if api_key.is_empty() {
            return Some(SkipReason::MissingApiKey);
        }
        None
    }

    fn stage_user_message(&self, action: TurnAction, ticket: &TurnTicket) -> Option<Message> {
        if action != TurnAction::Generate {
            return None;
        }

        let message = {
            let mut store = self.store.lock();
            let chat_id = store.active_id().unwrap_or_default().to_string();
            let message = Message::new(chat_id, Role::User, store.input());
            store.push_message(message.clone());
            store.clear_input();
            message
        };

        self.cancellation().advance(ticket, TurnPhase::UserMessageStaged);
        self.emit(SessionEvent::MessageAppended {
            message: message.clone(),
        });
        self.emit(SessionEvent::ScrollToBottom);
        Some(message)
    }

    /// Append the empty assistant message the reply streams into
    fn stage_placeholder(&self) -> String {
        let placeholder = {
            let mut store = self.store.lock();
            let chat_id = store.active_id().unwrap_or_default().to_string();
            let placeholder = Message::new(chat_id, Role::Assistant, "");
            store.push_message(placeholder.clone());
            placeholder
        };

        let id = placeholder.id.clone();
        self.emit(SessionEvent::MessageAppended {
            message: placeholder,
        });
        self.emit(SessionEvent::ScrollToBottom);
        id
    }

    fn build_generation_request(&self, api_key: String, reply_id: &str) -> GenerationRequest {
        let store = self.store.lock();
        let settings = match store.active_conversation() {
            Some(conversation) => conversation.generation_settings(&self.config().defaults),
            None => self.config().defaults.clone(),
        };

        let instruction = format!(
            "{} {} Current date: {}",
            settings.system_prompt,
            FORMAT_DIRECTIVE,
            Local::now().format("%A, %B %-d, %Y %H:%M")
        );
        let mut messages = vec![ChatMessage::system(instruction.trim_start())];
        messages.extend(
            store
                .messages()
                .iter()
                .filter(|m| m.id != reply_id)
                .map(Message::to_chat_message),
        );

        GenerationRequest {
            api_key,
            model: settings.model,
            messages,
            settings: settings.advanced_settings,
        }
    }

    /// Stream the reply into the placeholder. Returns the number of chunks read.
    async fn stream_reply(
        &self,
        request: GenerationRequest,
        reply_id: &str,
        ticket: &TurnTicket,
    ) -> ServiceResult<usize> {
        let token = ticket.token().clone();
        self.cancellation().advance(ticket, TurnPhase::AwaitingFirstByte);

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ServiceError::Cancelled),
            response = self.services.generation.generate(request) => response?,
        };

        let mut chunks = 0;
        let mut received_text = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ServiceError::Cancelled),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(text)) => {
                    if chunks == 0 {
                        self.cancellation().advance(ticket, TurnPhase::Streaming);
                    }
                    chunks += 1;
                    received_text |= !text.is_empty();
                    self.apply_chunk(reply_id, text);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if !received_text {
            return Err(ServiceError::EmptyBody);
        }
        Ok(chunks)
    }

    /// Append `text` to the reply message, if it still exists
    fn apply_chunk(&self, reply_id: &str, text: String) {
        if text.is_empty() {
            return;
        }
        if !self.store.lock().append_to_message(reply_id, &text) {
            debug!(message_id = %reply_id, "Reply message gone; chunk discarded");
            return;
        }

        self.emit(SessionEvent::ChunkApplied {
            message_id: reply_id.to_string(),
            text,
        });
        self.emit(SessionEvent::ScrollToBottom);
    }

    fn reply_is_empty(&self, reply_id: &str) -> bool {
        self.store
            .lock()
            .find_message(reply_id)
            .is_some_and(|m| m.content.is_empty())
    }

    fn write_fallback(&self, reply_id: &str) {
        let fallback = &self.config().fallback_message;
        if self.store.lock().replace_content(reply_id, fallback) {
            self.emit(SessionEvent::ContentReplaced {
                message_id: reply_id.to_string(),
                content: fallback.clone(),
            });
        }
    }

    /// Release the in-flight flag, then persist the turn's messages and swap
    /// their temporary ids for the persisted ones
    async fn finalize_turn(
        &self,
        ticket: &TurnTicket,
        user_message: Option<Message>,
        reply_id: &str,
    ) {
        self.cancellation().finish_turn(ticket);
        self.cancellation().advance(ticket, TurnPhase::Finalizing);

        let reply = self.store.lock().find_message(reply_id).cloned();
        let batch: Vec<Message> = user_message.into_iter().chain(reply).collect();
        if batch.is_empty() {
            warn!("Nothing left to persist");
            return;
        }

        let persisted = match self.services.messages.insert(batch.clone()).await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Failed to persist messages; keeping temporary ids");
                return;
            }
        };

        let mapping = reconcile_ids(&batch, &persisted);
        if mapping.is_empty() {
            warn!(
                submitted = batch.len(),
                returned = persisted.len(),
                "Persisted records matched no submitted message"
            );
            return;
        }

        let replaced = self.store.lock().replace_ids(&mapping);
        debug!(replaced, "Reconciled message ids");
        self.emit(SessionEvent::MessagesReconciled {
            replaced: mapping.into_iter().collect(),
        });
    }

    /// Ask the title service to name a conversation after its first exchange
    async fn derive_title(&self, api_key: &str) {
        let (messages, chat_id) = {
            let store = self.store.lock();
            if store.messages().len() != 2 {
                return;
            }
            (store.chat_history(), store.active_id().map(str::to_string))
        };
        let Some(chat_id) = chat_id else {
            debug!("No active conversation; skipping title");
            return;
        };

        let request = TitleRequest {
            messages,
            chat_id: chat_id.clone(),
            api_key: api_key.to_string(),
        };
        let raw_title = match self.services.titles.generate_title(request).await {
            Ok(Some(raw_title)) => raw_title,
            Ok(None) => {
                debug!("Title service returned no title");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Title generation failed");
                return;
            }
        };

        let Some(title) = clean_title(&raw_title) else {
            debug!("Generated title was empty");
            return;
        };
        if self.store.lock().set_title(&chat_id, title.clone()) {
            info!(conversation_id = %chat_id, title = %title, "Conversation titled");
            self.emit(SessionEvent::TitleUpdated {
                conversation_id: chat_id,
                title,
            });
        } else {
            debug!(conversation_id = %chat_id, "Conversation not listed; title dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Notify;

    use super::*;
    use crate::models::Conversation;
    use crate::settings::{AdvancedSettings, DEFAULT_FALLBACK_MESSAGE};
    use crate::test_helpers::{Script, harness, wait_until};

    #[tokio::test]
    async fn test_chunks_concatenate_in_order() {
        let h = harness(vec![Script::chunks(&["Hi", " there", "!"])]).await;
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        let messages = h.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hi there!");
        assert_eq!(h.session.input(), "");
        assert!(!h.session.is_handling());
        assert_eq!(h.session.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_request_carries_history_and_system_instruction() {
        let h = harness(vec![Script::chunks(&["ok"])]).await;
        let mut conversation = Conversation::new("chat-1");
        conversation.model = Some("gpt-4".to_string());
        conversation.system_prompt = Some("You are terse.".to_string());
        conversation.advanced_settings = Some(AdvancedSettings {
            temperature: 0.2,
            ..AdvancedSettings::default()
        });
        h.session.set_conversations(vec![conversation]);
        h.session.set_input("what is rust");

        h.session.submit_turn(TurnAction::Generate).await;

        let requests = h.generation.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.api_key, "sk-test");
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.settings.temperature, 0.2);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.starts_with("You are terse. "));
        assert!(request.messages[0].content.contains(FORMAT_DIRECTIVE));
        assert!(request.messages[0].content.contains("Current date: "));
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.messages[1].content, "what is rust");
    }

    #[tokio::test]
    async fn test_request_uses_defaults_without_active_conversation() {
        let h = harness(vec![Script::chunks(&["ok"])]).await;
        h.session.open_conversation(None, Vec::new());
        h.session.set_input("hello");

        h.session.submit_turn(TurnAction::Generate).await;

        let request = &h.generation.requests()[0];
        assert_eq!(request.model, h.session.config().defaults.model);
        assert_eq!(request.settings, AdvancedSettings::default());
    }

    #[tokio::test]
    async fn test_short_input_is_noop() {
        let h = harness(vec![Script::chunks(&["never"])]).await;
        h.session.set_input("a");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::InputTooShort));
        assert!(h.session.messages().is_empty());
        assert_eq!(h.session.input(), "a");
        assert!(h.generation.requests().is_empty());
    }

    #[tokio::test]
    async fn test_input_length_counts_characters() {
        let h = harness(vec![Script::chunks(&["ok"])]).await;
        // One character, two bytes
        h.session.set_input("é");
        assert_eq!(
            h.session.submit_turn(TurnAction::Generate).await,
            TurnOutcome::Skipped(SkipReason::InputTooShort)
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_noop() {
        let h = harness(vec![Script::chunks(&["never"])]).await;
        h.session.key_store().remove().await;
        h.session.set_input("hi");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::MissingApiKey));
        assert!(h.session.messages().is_empty());
        assert_eq!(h.session.input(), "hi");
        assert!(h.generation.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_in_flight_is_noop() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Script::gated(&["partial"], gate.clone(), &[" done"])]).await;
        h.session.set_input("first question");

        let session = h.session.clone();
        let first = tokio::spawn(async move { session.submit_turn(TurnAction::Generate).await });
        wait_until(|| h.session.phase() == TurnPhase::Streaming).await;

        h.session.set_input("second question");
        let before = h.session.messages();
        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Skipped(SkipReason::TurnInFlight));
        assert_eq!(h.session.messages(), before);
        assert_eq!(h.session.input(), "second question");

        gate.notify_one();
        assert_eq!(first.await.unwrap(), TurnOutcome::Completed);
        assert_eq!(h.session.messages()[1].content, "partial done");
        assert_eq!(h.generation.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_writes_fallback() {
        let h = harness(vec![Script::Fail(500)]).await;
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        let messages = h.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, DEFAULT_FALLBACK_MESSAGE);
        assert!(!h.session.is_handling());
        // The failed turn is still persisted
        assert_eq!(h.message_store.inserted().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_replaces_partial_content() {
        let h = harness(vec![Script::FailAfter(vec!["Hal", "f"])]).await;
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        let messages = h.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, DEFAULT_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_body_is_failure() {
        let h = harness(vec![Script::chunks(&[])]).await;
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert!(matches!(outcome, TurnOutcome::Failed(_)));
        assert_eq!(h.session.messages()[1].content, DEFAULT_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_partial_reply() {
        let h = harness(vec![Script::hang(&["Partial"])]).await;
        h.session.set_input("hello");
        let token_before = h.session.cancellation().current_token();

        let session = h.session.clone();
        let turn = tokio::spawn(async move { session.submit_turn(TurnAction::Generate).await });
        wait_until(|| h.session.phase() == TurnPhase::Streaming).await;

        h.session.cancel_turn();
        assert!(!h.session.is_handling());
        assert!(token_before.is_cancelled());
        assert!(!h.session.cancellation().current_token().is_cancelled());

        assert_eq!(turn.await.unwrap(), TurnOutcome::Cancelled);
        assert_eq!(h.session.messages()[1].content, "Partial");
        assert!(!h.session.is_handling());
        assert_eq!(h.session.phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk_writes_fallback() {
        let h = harness(vec![Script::hang(&[])]).await;
        h.session.set_input("hello");

        let session = h.session.clone();
        let turn = tokio::spawn(async move { session.submit_turn(TurnAction::Generate).await });
        wait_until(|| h.session.phase() == TurnPhase::AwaitingFirstByte).await;

        h.session.cancel_turn();

        assert_eq!(turn.await.unwrap(), TurnOutcome::Cancelled);
        assert_eq!(h.session.messages()[1].content, DEFAULT_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_dropped_turn_releases_flag_and_phase() {
        let h = harness(vec![Script::hang(&["Half"])]).await;
        h.session.set_input("hello");

        let session = h.session.clone();
        let turn = tokio::spawn(async move { session.submit_turn(TurnAction::Generate).await });
        wait_until(|| h.session.phase() == TurnPhase::Streaming).await;

        turn.abort();
        assert!(turn.await.unwrap_err().is_cancelled());

        assert!(!h.session.is_handling());
        assert_eq!(h.session.phase(), TurnPhase::Idle);
        assert_eq!(h.session.messages()[1].content, "Half");
    }

    #[tokio::test]
    async fn test_turn_after_cancel_runs_normally() {
        let h = harness(vec![Script::hang(&["Par"]), Script::chunks(&["Fresh"])]).await;
        h.session.set_input("first");

        let session = h.session.clone();
        let turn = tokio::spawn(async move { session.submit_turn(TurnAction::Generate).await });
        wait_until(|| h.session.phase() == TurnPhase::Streaming).await;
        h.session.cancel_turn();
        turn.await.unwrap();

        h.session.set_input("second");
        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        let messages = h.session.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].content, "Fresh");
    }

    #[tokio::test]
    async fn test_ids_reconciled_after_persist() {
        let h = harness(vec![Script::chunks(&["Hi"])]).await;
        h.session.set_input("hello");

        h.session.submit_turn(TurnAction::Generate).await;

        let inserted = h.message_store.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].len(), 2);
        assert_eq!(inserted[0][0].role, Role::User);
        assert_eq!(inserted[0][1].role, Role::Assistant);
        assert_eq!(inserted[0][1].content, "Hi");

        let messages = h.session.messages();
        assert_eq!(messages[0].id, "persisted-1");
        assert_eq!(messages[1].id, "persisted-2");
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].content, "Hi");
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_temporary_ids() {
        let h = harness(vec![Script::chunks(&["Hi"])]).await;
        h.message_store.set_failing(true);
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        let inserted = h.message_store.inserted();
        let messages = h.session.messages();
        assert_eq!(messages[0].id, inserted[0][0].id);
        assert_eq!(messages[1].id, inserted[0][1].id);
        assert!(!messages[0].id.starts_with("persisted-"));
        assert!(!h.session.is_handling());
    }

    #[tokio::test]
    async fn test_first_exchange_sets_title() {
        let h = harness(vec![Script::chunks(&["Hi there!"])]).await;
        h.titles.respond_with(Some("\"Greeting\""));
        let mut events = h.session.subscribe();
        h.session.set_input("hello");

        h.session.submit_turn(TurnAction::Generate).await;

        let conversation = h.session.active_conversation().unwrap();
        assert_eq!(conversation.title.as_deref(), Some("Greeting"));

        let requests = h.titles.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].chat_id, "chat-1");
        assert_eq!(requests[0].api_key, "sk-test");
        assert_eq!(requests[0].messages.len(), 2);

        let mut titled = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::TitleUpdated { title, .. } = event {
                assert_eq!(title, "Greeting");
                titled = true;
            }
        }
        assert!(titled);
    }

    #[tokio::test]
    async fn test_title_only_after_first_exchange() {
        let h = harness(vec![Script::chunks(&["one"]), Script::chunks(&["two"])]).await;
        h.titles.respond_with(Some("First"));
        h.session.set_input("hello");
        h.session.submit_turn(TurnAction::Generate).await;

        h.titles.respond_with(Some("Second"));
        h.session.set_input("again");
        h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(h.titles.requests().len(), 1);
        assert_eq!(
            h.session.active_conversation().unwrap().title.as_deref(),
            Some("First")
        );
    }

    #[tokio::test]
    async fn test_title_failure_is_swallowed() {
        let h = harness(vec![Script::chunks(&["Hi"])]).await;
        h.titles.fail();
        h.session.set_input("hello");

        let outcome = h.session.submit_turn(TurnAction::Generate).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert!(h.session.active_conversation().unwrap().title.is_none());
        assert!(!h.session.is_handling());
    }

    #[tokio::test]
    async fn test_blank_title_leaves_conversation_untitled() {
        let h = harness(vec![Script::chunks(&["Hi"])]).await;
        h.titles.respond_with(Some("  \"\"  "));
        h.session.set_input("hello");

        h.session.submit_turn(TurnAction::Generate).await;

        assert!(h.session.active_conversation().unwrap().title.is_none());
    }

    #[tokio::test]
    async fn test_events_follow_turn_lifecycle() {
        let h = harness(vec![Script::chunks(&["Hi", "!"])]).await;
        let mut events = h.session.subscribe();
        h.session.set_input("hello");

        h.session.submit_turn(TurnAction::Generate).await;

        let mut appended = 0;
        let mut chunks = Vec::new();
        let mut reconciled = false;
        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::MessageAppended { .. } => appended += 1,
                SessionEvent::ChunkApplied { text, .. } => chunks.push(text),
                SessionEvent::MessagesReconciled { replaced } => {
                    assert_eq!(replaced.len(), 2);
                    reconciled = true;
                }
                SessionEvent::TurnFinished { outcome } => finished = Some(outcome),
                _ => {}
            }
        }

        assert_eq!(appended, 2);
        assert_eq!(chunks, vec!["Hi", "!"]);
        assert!(reconciled);
        assert_eq!(finished, Some(TurnOutcome::Completed));
    }

    #[tokio::test]
    async fn test_chunk_for_missing_reply_is_discarded() {
        let h = harness(Vec::new()).await;
        h.session.apply_chunk("no-such-message", "lost".to_string());
        assert!(h.session.messages().is_empty());
    }
}
