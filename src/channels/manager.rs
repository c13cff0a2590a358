//! Channel manager: merges inbound streams and routes replies back.

use futures::stream::{self, StreamExt};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Owns every active channel.
#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        tracing::debug!(channel = channel.name(), "Channel registered");
        self.channels.push(channel);
    }

    /// Names of the registered channels.
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Start every channel and merge their streams.
    ///
    /// A channel that fails its health check is still started; the failure is
    /// logged. A channel that fails to start aborts startup.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            if let Err(e) = channel.health_check().await {
                tracing::warn!(channel = channel.name(), "Health check failed: {e}");
            }
            streams.push(channel.start().await?);
            tracing::info!(channel = channel.name(), "Channel started");
        }
        Ok(stream::select_all(streams).boxed())
    }

    /// Send a reply through the channel the message came from.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.name() == msg.channel)
            .ok_or_else(|| ChannelError::SendFailed {
                name: msg.channel.clone(),
                reason: "no such channel".into(),
            })?;
        channel.respond(msg, response).await
    }

    /// Shut every channel down, reporting the first failure.
    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        let mut first_err = None;
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), "Shutdown failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
