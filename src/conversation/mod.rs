//! Goal-setting conversation.
//!
//! Picking the weekly-goal menu item opens a conversation that captures the
//! user's next message as their goal, overriding normal routing until the
//! user answers or sends `/cancel`.

pub mod engine;
pub mod state;

pub use engine::ConversationEngine;
pub use state::{ConversationEvent, ConversationSession, ConversationState, Effect};
