pub mod cancellation;
pub mod conversation;
pub mod conversations_store;
pub mod message;
pub mod session_event;

pub use cancellation::{CancellationController, TurnPhase, TurnTicket};
pub use conversation::Conversation;
pub use conversations_store::ConversationsStore;
pub use message::{ChatMessage, Message, Role};
pub use session_event::{SessionEvent, SkipReason, TurnAction, TurnOutcome};
