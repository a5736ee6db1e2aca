pub mod chat_session;
pub mod regeneration_controller;
pub mod turn_controller;

pub use chat_session::{ChatSession, SessionServices};
