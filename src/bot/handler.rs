//! Message handler: decides what to do with one inbound message.
//!
//! An open conversation gets the message first; otherwise the router picks an
//! intent and the matching reply handler runs.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::channels::{IncomingMessage, OutgoingResponse};
use crate::conversation::{ConversationEngine, ConversationEvent, Effect};
use crate::handlers;
use crate::profile::ProfileStore;
use crate::router::{Intent, IntentRouter, Route};

/// Routes messages to the conversation engine or a reply handler.
///
/// Callers must not run two `handle_message` calls for the same user at once.
#[derive(Clone)]
pub struct MessageHandler {
    profiles: Arc<ProfileStore>,
    conversations: Arc<ConversationEngine>,
}

impl MessageHandler {
    pub fn new(profiles: Arc<ProfileStore>, conversations: Arc<ConversationEngine>) -> Self {
        Self {
            profiles,
            conversations,
        }
    }

    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    pub fn conversations(&self) -> &Arc<ConversationEngine> {
        &self.conversations
    }

    /// Produce the reply for one message, applying any state changes.
    pub async fn handle_message(&self, message: &IncomingMessage) -> OutgoingResponse {
        let user_id = message.user_id.as_str();
        let now = Utc::now();

        let state = self.conversations.state_at(user_id, now).await;
        let route = IntentRouter::classify(&message.content, state.is_open());

        debug!(
            user_id,
            channel = %message.channel,
            %state,
            chars = message.content.len(),
            "Routing message"
        );

        match route {
            // Stickers and photos are not an answer; the session stays open.
            Route::Conversation if message.is_non_text() => {
                debug!(user_id, "Non-text message during conversation");
                handlers::fallback()
            }
            Route::Conversation => {
                let event = ConversationEvent::from_message(&message.content);
                let effect = self.conversations.apply_at(user_id, event, now).await;
                render_effect(effect)
            }
            Route::Intent(intent) => {
                debug!(user_id, %intent, "Intent classified");
                self.handle_intent(intent, message).await
            }
        }
    }

    async fn handle_intent(&self, intent: Intent, message: &IncomingMessage) -> OutgoingResponse {
        let user_id = message.user_id.as_str();
        match intent {
            Intent::Start => handlers::start(&message.display_name()),
            Intent::About => handlers::about(),
            Intent::ShowProgress => handlers::progress(&self.profiles.snapshot(user_id).await),
            Intent::EnterGoalFlow => {
                let effect = self
                    .conversations
                    .apply(user_id, ConversationEvent::EnterGoalFlow)
                    .await;
                render_effect(effect)
            }
            Intent::ShowRecommendations => {
                handlers::recommendations(&self.profiles.snapshot(user_id).await)
            }
            Intent::ShowFaq => handlers::faq(),
            Intent::Cancel => {
                let effect = self
                    .conversations
                    .apply(user_id, ConversationEvent::Cancel)
                    .await;
                render_effect(effect)
            }
            Intent::FreeText(_) => handlers::fallback(),
        }
    }
}

fn render_effect(effect: Effect) -> OutgoingResponse {
    match effect {
        Effect::PromptForGoal => handlers::goal_prompt(),
        Effect::StoreGoal(goal) => handlers::goal_saved(goal.as_deref()),
        Effect::Cancelled => handlers::cancelled(),
        Effect::Ignored => handlers::fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationState;
    use crate::keyboard::labels;

    fn handler() -> MessageHandler {
        let profiles = ProfileStore::new();
        let conversations = Arc::new(ConversationEngine::new(Arc::clone(&profiles), None));
        MessageHandler::new(profiles, conversations)
    }

    async fn send(handler: &MessageHandler, user: &str, text: &str) -> String {
        let msg = IncomingMessage::new("test", user, text).with_user_name("Anna");
        handler.handle_message(&msg).await.content
    }

    #[tokio::test]
    async fn start_greets_sender() {
        let h = handler();
        assert!(send(&h, "u", "/start").await.starts_with("Hi, Anna!"));
    }

    #[tokio::test]
    async fn start_without_name_uses_placeholder() {
        let h = handler();
        let msg = IncomingMessage::new("test", "u", "/start");
        let reply = h.handle_message(&msg).await;
        assert!(reply.content.starts_with("Hi, user!"));
    }

    #[tokio::test]
    async fn goal_then_progress_scenario() {
        let h = handler();

        let prompt = send(&h, "u", labels::WEEK_GOAL).await;
        assert_eq!(prompt, handlers::goal_prompt().content);

        let confirm = send(&h, "u", "finish 5 lessons").await;
        assert!(confirm.contains("finish 5 lessons"));
        assert_eq!(
            h.conversations().state("u").await,
            ConversationState::Idle
        );

        let progress = send(&h, "u", labels::PROGRESS).await;
        assert!(progress.contains("finish 5 lessons"));
    }

    #[tokio::test]
    async fn fresh_user_recommendations_redirect() {
        let h = handler();
        let reply = send(&h, "new", labels::RECOMMENDATIONS).await;
        assert_eq!(reply, handlers::recommendations(&Default::default()).content);
        assert!(!reply.contains(handlers::GOAL_NOT_SET));
    }

    #[tokio::test]
    async fn recommendations_quote_stored_goal() {
        let h = handler();
        send(&h, "u", labels::WEEK_GOAL).await;
        send(&h, "u", "  learn SQL joins  ").await;
        let reply = send(&h, "u", labels::RECOMMENDATIONS).await;
        assert!(reply.contains("Goal: learn SQL joins\n"));
    }

    #[tokio::test]
    async fn open_conversation_captures_labels_and_commands() {
        let h = handler();
        send(&h, "u", labels::WEEK_GOAL).await;
        let confirm = send(&h, "u", labels::FAQ).await;
        assert!(confirm.contains(labels::FAQ));
        assert_eq!(
            h.profiles().week_goal("u").await.as_deref(),
            Some(labels::FAQ)
        );

        send(&h, "u", labels::WEEK_GOAL).await;
        send(&h, "u", "/start").await;
        assert_eq!(h.profiles().week_goal("u").await.as_deref(), Some("/start"));
    }

    #[tokio::test]
    async fn cancel_inside_flow_keeps_goal() {
        let h = handler();
        send(&h, "u", labels::WEEK_GOAL).await;
        let ack = send(&h, "u", "/cancel").await;
        assert_eq!(ack, handlers::cancelled().content);
        assert_eq!(h.profiles().week_goal("u").await, None);

        // Back to normal routing.
        let faq = send(&h, "u", labels::FAQ).await;
        assert_eq!(faq, handlers::faq().content);
    }

    #[tokio::test]
    async fn cancel_outside_flow_is_acknowledged() {
        let h = handler();
        let ack = send(&h, "u", "/cancel").await;
        assert_eq!(ack, handlers::cancelled().content);
    }

    #[tokio::test]
    async fn empty_goal_is_stored_as_unset() {
        let h = handler();
        send(&h, "u", labels::WEEK_GOAL).await;
        let confirm = send(&h, "u", "   ").await;
        assert!(confirm.contains(handlers::GOAL_NOT_SET));
        assert_eq!(h.profiles().week_goal("u").await, None);
    }

    #[tokio::test]
    async fn sticker_during_flow_keeps_goal_and_session() {
        let h = handler();
        send(&h, "u", labels::WEEK_GOAL).await;
        send(&h, "u", "finish 5 lessons").await;
        send(&h, "u", labels::WEEK_GOAL).await;

        let sticker = IncomingMessage::new("telegram", "u", "")
            .with_metadata(serde_json::json!({"non_text": true}));
        let reply = h.handle_message(&sticker).await;

        assert_eq!(reply.content, handlers::fallback().content);
        assert_eq!(
            h.profiles().week_goal("u").await.as_deref(),
            Some("finish 5 lessons")
        );
        assert_eq!(
            h.conversations().state("u").await,
            ConversationState::AwaitingWeekGoal
        );

        // The next text answer is still captured.
        let confirm = send(&h, "u", "learn recursion").await;
        assert!(confirm.contains("learn recursion"));
    }

    #[tokio::test]
    async fn unknown_text_gets_fallback() {
        let h = handler();
        for text in ["what?", "", "/help", "📊 my progress"] {
            assert_eq!(send(&h, "u", text).await, handlers::fallback().content);
        }
    }

    #[tokio::test]
    async fn every_reply_has_keyboard() {
        let h = handler();
        for text in ["/start", "/about", labels::PROGRESS, labels::FAQ, "hm"] {
            let msg = IncomingMessage::new("test", "u", text);
            assert!(h.handle_message(&msg).await.keyboard.is_some());
        }
    }

    #[tokio::test]
    async fn two_users_in_flow_concurrently() {
        let h = handler();
        send(&h, "alice", labels::WEEK_GOAL).await;
        send(&h, "bob", labels::WEEK_GOAL).await;

        let (a, b) = tokio::join!(
            send(&h, "alice", "learn recursion"),
            send(&h, "bob", "finish the web course"),
        );
        assert!(a.contains("learn recursion"));
        assert!(b.contains("finish the web course"));

        assert_eq!(
            h.profiles().week_goal("alice").await.as_deref(),
            Some("learn recursion")
        );
        assert_eq!(
            h.profiles().week_goal("bob").await.as_deref(),
            Some("finish the web course")
        );
    }
}
