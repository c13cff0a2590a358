//! Main bot loop: reads the merged channel stream, hands each message to its
//! sender's lane, and sends replies back through the originating channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::bot::handler::MessageHandler;
use crate::bot::lanes::{LaneProcessor, UserLanes};
use crate::channels::{ChannelManager, IncomingMessage};
use crate::config::BotConfig;
use crate::error::Error;

/// Runtime tuning for the loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bot name for logs.
    pub name: String,
    /// Abandoned goal conversations expire after this long, if set.
    pub session_idle_timeout: Option<Duration>,
    /// How often abandoned conversations are pruned.
    pub prune_interval: Duration,
    /// A per-user lane task exits after being idle this long.
    pub lane_idle_timeout: Duration,
    /// Longest a reply delivery may hold up the sender's lane.
    pub reply_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "course-companion".to_string(),
            session_idle_timeout: None,
            prune_interval: Duration::from_secs(600), // 10 minutes
            lane_idle_timeout: Duration::from_secs(300),
            reply_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&BotConfig> for RuntimeConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            session_idle_timeout: config.session_idle_timeout,
            lane_idle_timeout: config.lane_idle_timeout,
            ..Self::default()
        }
    }
}

/// Handles a message on its lane and delivers the reply.
struct Responder {
    handler: MessageHandler,
    channels: Arc<ChannelManager>,
    reply_timeout: Duration,
}

#[async_trait]
impl LaneProcessor for Responder {
    async fn process(&self, message: IncomingMessage) {
        let response = self.handler.handle_message(&message).await;
        let delivery = self.channels.respond(&message, response);
        match tokio::time::timeout(self.reply_timeout, delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    user_id = %message.user_id,
                    channel = %message.channel,
                    "Failed to deliver reply: {e}"
                );
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %message.user_id,
                    channel = %message.channel,
                    timeout_secs = self.reply_timeout.as_secs(),
                    "Reply delivery timed out"
                );
            }
        }
    }
}

/// The bot: channels in, replies out.
pub struct Bot {
    config: RuntimeConfig,
    handler: MessageHandler,
    channels: Arc<ChannelManager>,
}

impl Bot {
    pub fn new(config: RuntimeConfig, handler: MessageHandler, channels: ChannelManager) -> Self {
        Self {
            config,
            handler,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl+C received, shutting down...");
        })
        .await
    }

    /// Run until `shutdown` resolves or every channel stream ends.
    ///
    /// On exit, queued messages are still processed before channels shut down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let mut message_stream = self.channels.start_all().await?;

        // Spawn pruning task for abandoned goal conversations
        let pruning_handle = self.config.session_idle_timeout.map(|_| {
            let conversations = Arc::clone(self.handler.conversations());
            let prune_interval = self.config.prune_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(prune_interval);
                interval.tick().await; // Skip immediate first tick
                loop {
                    interval.tick().await;
                    conversations.prune_abandoned().await;
                }
            })
        });

        let processor = Arc::new(Responder {
            handler: self.handler.clone(),
            channels: Arc::clone(&self.channels),
            reply_timeout: self.config.reply_timeout,
        });
        let mut lanes = UserLanes::new(processor, self.config.lane_idle_timeout);

        let mut reap_interval = tokio::time::interval(self.config.lane_idle_timeout);
        reap_interval.tick().await;

        tracing::info!("Bot {} ready and listening", self.config.name);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = reap_interval.tick() => {
                    let reaped = lanes.reap_finished();
                    if reaped > 0 {
                        tracing::debug!(reaped, active = lanes.len(), "Reaped idle lanes");
                    }
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(message) => {
                            tracing::debug!(
                                user_id = %message.user_id,
                                channel = %message.channel,
                                "Message received"
                            );
                            lanes.dispatch(message);
                        }
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            }
        }

        // Cleanup
        tracing::info!("Bot shutting down...");
        lanes.shutdown().await;
        if let Some(handle) = pruning_handle {
            handle.abort();
        }
        self.channels.shutdown_all().await?;

        Ok(())
    }
}
