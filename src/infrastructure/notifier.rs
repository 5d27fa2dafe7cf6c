//! Notification sinks for backup progress and failures.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::Notifier;
use crate::domain::Result;

use super::discord::DiscordClient;

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notice(&self, text: &str) -> Result<()> {
        tracing::info!("{text}");
        Ok(())
    }

    async fn warning(&self, text: &str) -> Result<()> {
        tracing::warn!("{text}");
        Ok(())
    }
}

/// Posts notices as embeds to a Discord channel, and logs them too.
pub struct DiscordNotifier {
    client: Arc<DiscordClient>,
    channel: String,
}

impl DiscordNotifier {
    #[must_use]
    pub fn new(client: Arc<DiscordClient>, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notice(&self, text: &str) -> Result<()> {
        LogNotifier.notice(text).await?;
        self.client.post_notice(&self.channel, text).await
    }

    async fn warning(&self, text: &str) -> Result<()> {
        LogNotifier.warning(text).await?;
        self.client.post_warning(&self.channel, text).await
    }
}
