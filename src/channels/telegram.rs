//! Telegram channel: long-polls the Bot API for updates.
//!
//! Replies are sent with `sendMessage`, carrying the reply keyboard as
//! `reply_markup`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Back-off after a failed poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Deadline for every call other than `getUpdates`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Slack on top of the long-poll timeout before `getUpdates` is abandoned.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Commands advertised in the client's command menu.
const BOT_COMMANDS: [(&str, &str); 3] = [
    ("start", "Start and show the menu"),
    ("about", "What this bot can do"),
    ("cancel", "Cancel the current step"),
];

/// Telegram channel over Bot API long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    poll_timeout: Duration,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, poll_timeout: Duration) -> Self {
        Self {
            bot_token,
            poll_timeout,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// How long a single `getUpdates` request may take.
    fn poll_deadline(&self) -> Duration {
        self.poll_timeout + POLL_TIMEOUT_MARGIN
    }

    /// The bot's own username, from `getMe`.
    async fn get_me(&self) -> Result<Option<String>, ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "Telegram getMe failed");
            return Err(ChannelError::HealthCheckFailed {
                name: "telegram".into(),
            });
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| ChannelError::StartupFailed {
            name: "telegram".into(),
            reason: e.without_url().to_string(),
        })?;
        Ok(data["result"]["username"].as_str().map(str::to_string))
    }

    /// Send a text message. Long texts are split to fit Telegram's limit; the
    /// keyboard goes with the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        response: &OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(&response.content, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let body = send_message_body(chat_id, chunk, response, i == last);
            self.send_message_chunk(&body).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(&self, body: &serde_json::Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }

        Ok(())
    }

    /// Publish the command list shown in the client's menu.
    async fn register_commands(&self) -> Result<(), ChannelError> {
        let commands: Vec<serde_json::Value> = BOT_COMMANDS
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();

        let resp = self
            .client
            .post(self.api_url("setMyCommands"))
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({ "commands": commands }))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("setMyCommands returned {}", resp.status()),
            })
        }
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        if let Err(e) = self.register_commands().await {
            tracing::warn!("Could not register bot commands: {e}");
        }

        // Needed to recognize `/command@ThisBot` in group chats.
        let bot_username = match self.get_me().await {
            Ok(username) => username,
            Err(e) => {
                tracing::warn!("Could not read bot username, @-mentioned commands are ignored: {e}");
                None
            }
        };

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let poll_timeout = self.poll_timeout.as_secs();
        let poll_deadline = self.poll_deadline();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": poll_timeout,
                    "allowed_updates": ["message"]
                });

                let request = client.post(&url).timeout(poll_deadline).json(&body);
                let resp = match request.send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {}", e.without_url());
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {}", e.without_url());
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    tracing::warn!(
                        description = data.get("description").and_then(|d| d.as_str()),
                        "Telegram getUpdates returned no result"
                    );
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, bot_username.as_deref())
                    else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        self.send_message(chat_id, &response).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.get_me().await.map(|_| ())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        bot_token.expose_secret()
    )
}

/// Convert one `getUpdates` entry into an `IncomingMessage`.
///
/// Messages without text (stickers, photos, ...) come through with empty
/// content so they get the same fallback reply as unrecognized text.
/// Updates without a sender or chat are dropped.
fn parse_update(
    update: &serde_json::Value,
    bot_username: Option<&str>,
) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(serde_json::Value::as_i64)?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    let text = message.get("text").and_then(serde_json::Value::as_str);
    let username = from.get("username").and_then(|u| u.as_str());
    let first_name = from.get("first_name").and_then(|n| n.as_str());

    let content = strip_bot_mention(text.unwrap_or(""), bot_username);
    let mut incoming = IncomingMessage::new("telegram", &user_id.to_string(), &content)
        .with_metadata(serde_json::json!({
            "chat_id": chat_id.to_string(),
            "username": username,
            "non_text": text.is_none(),
        }));
    if let Some(name) = first_name {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// Drop `@ThisBot` from a leading command, as group chats send it.
///
/// Commands addressed to other bots, or any command when our own username is
/// unknown, are left untouched so the router does not treat them as ours.
fn strip_bot_mention(text: &str, bot_username: Option<&str>) -> String {
    let Some(username) = bot_username else {
        return text.to_string();
    };

    let trimmed = text.trim_start();
    let token_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (token, rest) = trimmed.split_at(token_end);

    match token.split_once('@') {
        Some((command, mention))
            if command.starts_with('/') && mention.eq_ignore_ascii_case(username) =>
        {
            format!("{command}{rest}")
        }
        _ => text.to_string(),
    }
}

/// Request body for one `sendMessage` call.
fn send_message_body(
    chat_id: &str,
    text: &str,
    response: &OutgoingResponse,
    with_keyboard: bool,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if with_keyboard {
        if let Some(ref keyboard) = response.keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard).unwrap_or_default();
        }
    }
    body
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
