//! Reply delivery back into Discord channels.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use poise::serenity_prelude::{self as serenity, Http};

use crate::error::SendError;
use crate::session::ReplySink;
use crate::types::ChannelId;

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

pub struct DiscordReplySink {
    http: Arc<Http>,
}

impl DiscordReplySink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

impl ReplySink for DiscordReplySink {
    async fn send_reply(&self, channel_id: ChannelId, text: &str) -> Result<(), SendError> {
        let channel = serenity::ChannelId::new(channel_id.0);
        match tokio::time::timeout(SEND_TIMEOUT, channel.say(&self.http, text)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SendError::Platform(e.to_string())),
            Err(_) => Err(SendError::Timeout),
        }
    }

    async fn start_typing(&self, channel_id: ChannelId) {
        let channel = serenity::ChannelId::new(channel_id.0);
        if let Err(e) = channel.broadcast_typing(&self.http).await {
            debug!("Failed to broadcast typing indicator: {e}");
        }
    }
}
