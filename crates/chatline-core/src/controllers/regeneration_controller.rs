use tracing::{debug, info, warn};

use super::chat_session::ChatSession;
use super::turn_controller::InFlightGuard;
use crate::models::{Message, SessionEvent, SkipReason, TurnAction, TurnOutcome};

impl ChatSession {
    /// Whether a reply can be regenerated right now
    pub fn regenerate_available(&self) -> bool {
        if self.is_handling() {
            return false;
        }
        self.store
            .lock()
            .messages()
            .iter()
            .any(Message::is_assistant)
    }

    /// Drop the trailing assistant reply, retract it from the message store
    /// and generate a new one for the same history.
    ///
    /// The in-flight flag is taken before the history is trimmed and held
    /// through the retract, so no other turn can interleave.
    pub async fn regenerate_turn(&self) -> TurnOutcome {
        // Checked before trimming so a missing key leaves the reply in place
        let api_key = self.key_store().get();
        if api_key.is_empty() {
            debug!("No API key; regeneration skipped");
            return TurnOutcome::Skipped(SkipReason::MissingApiKey);
        }

        let Some(guard) = InFlightGuard::acquire(self.cancellation()) else {
            debug!("Turn in flight; regeneration skipped");
            return TurnOutcome::Skipped(SkipReason::TurnInFlight);
        };

        let removed = self.store.lock().pop_trailing_assistant();
        let Some(removed) = removed else {
            debug!("Last message is not an assistant reply; nothing to regenerate");
            return TurnOutcome::Skipped(SkipReason::NothingToRegenerate);
        };

        info!(message_id = %removed.id, "Regenerating reply");
        self.emit(SessionEvent::MessageRemoved {
            message_id: removed.id.clone(),
        });

        if let Err(e) = self.services.messages.retract(removed).await {
            warn!(error = %e, "Failed to retract replaced reply");
        }

        self.run_turn(guard, TurnAction::Regenerate, api_key).await
    }
}
