//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::keyboard::ReplyKeyboard;

/// Placeholder used when a sender has neither a first name nor a handle.
pub const FALLBACK_DISPLAY_NAME: &str = "user";

/// Stream of inbound messages produced by a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A message received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel that produced this message.
    pub channel: String,
    /// Stable id of the sender.
    pub user_id: String,
    /// Sender's first name, if known.
    pub user_name: Option<String>,
    /// Message text. Empty for non-text messages.
    pub content: String,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (chat id, handle, ...).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            received_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sender's handle, from the `username` metadata field.
    pub fn username(&self) -> Option<&str> {
        self.metadata.get("username").and_then(|v| v.as_str())
    }

    /// Whether the channel flagged this as a non-text message (sticker,
    /// photo, ...).
    pub fn is_non_text(&self) -> bool {
        self.metadata
            .get("non_text")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Name to greet the sender by: first name, else handle, else a generic
    /// placeholder.
    pub fn display_name(&self) -> String {
        let first_name = self.user_name.as_deref().map(str::trim);
        let username = self.username().map(str::trim);
        first_name
            .filter(|n| !n.is_empty())
            .or(username.filter(|n| !n.is_empty()))
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }
}

/// A reply to send back to the originating chat.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingResponse {
    pub content: String,
    /// Reply keyboard to show under the message.
    pub keyboard: Option<ReplyKeyboard>,
    pub metadata: serde_json::Value,
}

impl OutgoingResponse {
    /// A plain text reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            keyboard: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A source of inbound messages and a sink for replies.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name, matched against `IncomingMessage::channel`.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a reply to the chat `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Check the channel can reach its backend.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Stop the channel.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}
