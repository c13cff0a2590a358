//! Intent router: classifies inbound text into the action it asks for.
//!
//! Precedence, first match wins:
//! 1. an open conversation captures the message before any classification;
//! 2. a command as the leading token (`/start`, `/about`, `/cancel`);
//! 3. exact equality with one of the main menu labels, surrounding
//!    whitespace included;
//! 4. anything else is free text.
//!
//! Channels deliver commands without a bot mention; Telegram strips
//! `@ThisBot` itself and leaves mentions of other bots in place.

use crate::keyboard::labels;

/// What an inbound message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    About,
    ShowProgress,
    EnterGoalFlow,
    ShowRecommendations,
    ShowFaq,
    Cancel,
    /// Unrecognized input, trimmed. Empty for blank or non-text messages.
    FreeText(String),
}

impl Intent {
    /// Stable name for logs. Never includes user text.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::About => "about",
            Self::ShowProgress => "show_progress",
            Self::EnterGoalFlow => "enter_goal_flow",
            Self::ShowRecommendations => "show_recommendations",
            Self::ShowFaq => "show_faq",
            Self::Cancel => "cancel",
            Self::FreeText(_) => "free_text",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The user has an open conversation; it consumes the message as-is.
    Conversation,
    /// Normal routing to an action handler.
    Intent(Intent),
}

/// Classifies inbound messages.
pub struct IntentRouter;

impl IntentRouter {
    /// Route a message, honouring an open conversation first.
    pub fn classify(content: &str, has_open_session: bool) -> Route {
        if has_open_session {
            return Route::Conversation;
        }
        Route::Intent(Self::classify_intent(content))
    }

    /// Classify a message as if no conversation were open.
    pub fn classify_intent(content: &str) -> Intent {
        if let Some(intent) = Self::parse_command(content) {
            return intent;
        }

        match content {
            labels::PROGRESS => Intent::ShowProgress,
            labels::WEEK_GOAL => Intent::EnterGoalFlow,
            labels::RECOMMENDATIONS => Intent::ShowRecommendations,
            labels::FAQ => Intent::ShowFaq,
            _ => Intent::FreeText(content.trim().to_string()),
        }
    }

    /// Recognize a command in the leading token.
    ///
    /// The token must be the whole first word: `/start now` is `Start`,
    /// `/started` and `say /start` are not commands. A token still carrying
    /// a `@mention` is addressed to another bot. Unknown commands return
    /// `None`.
    pub fn parse_command(content: &str) -> Option<Intent> {
        let token = content.split_whitespace().next()?;
        if !token.starts_with('/') {
            return None;
        }

        match token.to_lowercase().as_str() {
            "/start" => Some(Intent::Start),
            "/about" => Some(Intent::About),
            "/cancel" => Some(Intent::Cancel),
            _ => None,
        }
    }
}
