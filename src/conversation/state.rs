//! Goal conversation state machine.
//!
//! Transitions are a pure function of `(state, event)`; the engine owns the
//! per-user state table and carries out the returned effect.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::router::{Intent, IntentRouter};

/// Where a user is in the goal conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No conversation open; messages go through the router.
    #[default]
    Idle,
    /// The next message is the weekly goal.
    AwaitingWeekGoal,
}

impl ConversationState {
    /// Whether this state captures the user's messages.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingWeekGoal => "awaiting_week_goal",
        };
        write!(f, "{s}")
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// The user picked the weekly-goal menu item.
    EnterGoalFlow,
    /// A message arrived while the conversation was open.
    Reply(String),
    /// `/cancel`.
    Cancel,
}

impl ConversationEvent {
    /// Interpret a message received while a conversation is open.
    ///
    /// Only `/cancel` keeps its meaning; every other text, labels and other
    /// commands included, is the user's answer.
    pub fn from_message(content: &str) -> Self {
        match IntentRouter::parse_command(content) {
            Some(Intent::Cancel) => Self::Cancel,
            _ => Self::Reply(content.to_string()),
        }
    }
}

/// What the engine must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the user for their weekly goal.
    PromptForGoal,
    /// Store the goal (`None` clears it) and confirm.
    StoreGoal(Option<String>),
    /// Acknowledge a cancellation. Nothing is written.
    Cancelled,
    /// Nothing to do.
    Ignored,
}

/// The transition table.
pub fn transition(
    state: ConversationState,
    event: ConversationEvent,
) -> (ConversationState, Effect) {
    use ConversationEvent as Ev;
    use ConversationState::*;

    match (state, event) {
        (Idle, Ev::EnterGoalFlow) | (AwaitingWeekGoal, Ev::EnterGoalFlow) => {
            (AwaitingWeekGoal, Effect::PromptForGoal)
        }
        (AwaitingWeekGoal, Ev::Reply(text)) => (Idle, Effect::StoreGoal(normalize_goal(&text))),
        (_, Ev::Cancel) => (Idle, Effect::Cancelled),
        (Idle, Ev::Reply(_)) => (Idle, Effect::Ignored),
    }
}

/// Trim a goal answer; blank answers mean "no goal".
pub fn normalize_goal(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// An open conversation for one user.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub state: ConversationState,
    /// When the current state was entered.
    pub entered_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(state: ConversationState, entered_at: DateTime<Utc>) -> Self {
        Self { state, entered_at }
    }

    /// Whether the session has been idle for at least `timeout` as of `now`.
    pub fn is_expired(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.entered_at)
            .to_std()
            .map(|elapsed| elapsed >= timeout)
            .unwrap_or(false)
    }
}
