use super::message::Message;

/// What a turn does with the message list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnAction {
    /// Stage the input buffer as a user message, then reply to it
    Generate,
    /// Reply again to the existing history (trailing assistant message already removed)
    Regenerate,
}

/// Outcome of a call to `submit_turn`
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// A precondition failed; nothing was touched
    Skipped(SkipReason),
    /// The reply streamed to completion
    Completed,
    /// Generation failed and the fallback text was written
    Failed(String),
    /// The turn was cancelled while generating
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    TurnInFlight,
    InputTooShort,
    MissingApiKey,
    NothingToRegenerate,
}

/// Events emitted by `ChatSession` for decoupled UI updates
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// The view should scroll to the latest message
    ScrollToBottom,
    MessageAppended {
        message: Message,
    },
    MessageRemoved {
        message_id: String,
    },
    ChunkApplied {
        message_id: String,
        text: String,
    },
    /// A message's content was overwritten (fallback text)
    ContentReplaced {
        message_id: String,
        content: String,
    },
    /// Provisional ids were swapped for persisted ones
    MessagesReconciled {
        replaced: Vec<(String, String)>,
    },
    TitleUpdated {
        conversation_id: String,
        title: String,
    },
    TurnFinished {
        outcome: TurnOutcome,
    },
}
