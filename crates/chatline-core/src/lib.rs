//! Client-side engine for streamed chat conversations.
//!
//! A [`ChatSession`] owns the conversation state and runs turns against three
//! collaborating services: a text generator that streams its reply, a title
//! generator and a message store that assigns persisted ids.

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controllers::{ChatSession, SessionServices};
pub use models::{SessionEvent, SkipReason, TurnAction, TurnOutcome, TurnPhase};
