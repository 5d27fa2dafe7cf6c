//! Discord REST adapter.
//!
//! Implements `ChatPlatform` over API v10: guild channels are resolved by
//! name from a cached listing, and history is paged with snowflake anchors.
//! Rate-limited requests are retried after the delay Discord asks for.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::application::{Anchor, ChatPlatform, HistoryPageRequest, PAGE_SIZE};
use crate::domain::{
    AppError, Attachment, Author, ChannelHandle, DiscordConfig, Embed, EmbedKind, Message, Result,
};

/// First second of 2015, the origin of Discord snowflakes.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Embed color used for warnings.
const WARNING_COLOR: u32 = 0x00FF_C800;

/// Guild text channel type.
const GUILD_TEXT: u8 = 0;

/// Retries of a single request answered with 429.
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Wait used when a 429 carries no usable delay.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Upper bound on a single rate-limit wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Smallest snowflake whose timestamp is at or after `t`.
#[must_use]
pub fn snowflake_at(t: DateTime<Utc>) -> u64 {
    let ms = (t.timestamp_millis() - DISCORD_EPOCH_MS).max(0);
    u64::try_from(ms).unwrap_or(0) << 22
}

/// Build the shared HTTP client, honoring an optional proxy.
///
/// # Errors
/// Returns a configuration error for an invalid proxy URL.
pub fn build_http_client(proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        "cortana-backup/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| AppError::config(format!("Invalid proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(default)]
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    url: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedMedia {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    proxy_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbed {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<WireEmbedAuthor>,
    #[serde(default)]
    image: Option<WireEmbedMedia>,
    #[serde(default)]
    thumbnail: Option<WireEmbedMedia>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: String,
    timestamp: String,
    #[serde(default)]
    edited_timestamp: Option<String>,
    author: WireUser,
    #[serde(default)]
    member: Option<WireMember>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
    #[serde(default)]
    embeds: Vec<WireEmbed>,
}

fn parse_timestamp(text: &str, message_id: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::content_shape(format!("Bad timestamp '{text}' on message {message_id}: {e}")))
}

impl WireEmbed {
    fn into_embed(self) -> Embed {
        Embed {
            kind: EmbedKind::from(self.kind.as_deref().unwrap_or("rich")),
            author_name: self.author.and_then(|a| a.name),
            title: self.title,
            description: self.description,
            url: self.url,
            image_url: self.image.and_then(|i| i.url),
            thumbnail_proxy_url: self.thumbnail.and_then(|t| t.proxy_url),
        }
    }
}

impl WireMessage {
    fn into_message(self) -> Result<Message> {
        let created_at = parse_timestamp(&self.timestamp, &self.id)?;
        let edited_at = self
            .edited_timestamp
            .as_deref()
            .map(|t| parse_timestamp(t, &self.id))
            .transpose()?;

        let display_name = self
            .member
            .and_then(|m| m.nick)
            .or(self.author.global_name)
            .unwrap_or(self.author.username);

        Ok(Message {
            id: self.id,
            author: Author {
                display_name,
                color: None,
            },
            content: self.content,
            created_at,
            edited_at,
            attachments: self
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    url: a.url,
                    content_type: a.content_type,
                    filename: a.filename,
                })
                .collect(),
            embeds: self.embeds.into_iter().map(WireEmbed::into_embed).collect(),
        })
    }
}

/// Decode a history page body into domain messages.
///
/// # Errors
/// Returns error if the JSON or any timestamp is malformed.
fn decode_messages(body: &str) -> Result<Vec<Message>> {
    let wire: Vec<WireMessage> = serde_json::from_str(body).map_err(AppError::json_parse)?;
    wire.into_iter().map(WireMessage::into_message).collect()
}

#[derive(Debug, Deserialize)]
struct WireRateLimit {
    retry_after: f64,
}

/// Delay requested by a 429: the `Retry-After` header, else the body's
/// `retry_after`, both in seconds. Capped at `MAX_RETRY_AFTER`.
fn retry_after(header: Option<&str>, body: &str) -> Duration {
    let seconds = header
        .and_then(|h| h.trim().parse::<f64>().ok())
        .or_else(|| {
            serde_json::from_str::<WireRateLimit>(body)
                .ok()
                .map(|r| r.retry_after)
        })
        .filter(|s| s.is_finite() && *s >= 0.0);

    seconds.map_or(DEFAULT_RETRY_AFTER, |s| {
        Duration::from_secs_f64(s.min(MAX_RETRY_AFTER.as_secs_f64()))
    })
}

fn anchor_param(anchor: &Anchor) -> String {
    match anchor {
        Anchor::Time(t) => snowflake_at(*t).to_string(),
        Anchor::Message(id) => id.clone(),
    }
}

/// Discord REST client bound to one guild.
pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
    guild_id: u64,
    channels: RwLock<HashMap<String, String>>,
}

impl DiscordClient {
    /// Create a client, reading the bot token from the configured variable.
    ///
    /// # Errors
    /// Returns a configuration error if the token variable is unset.
    pub fn from_config(config: &DiscordConfig, client: Client) -> Result<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            AppError::config(format!("Bot token variable {} is not set", config.token_env))
        })?;
        if config.guild_id == 0 {
            return Err(AppError::config("discord.guild_id is not configured"));
        }

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            guild_id: config.guild_id,
            channels: RwLock::new(HashMap::new()),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Send `request`, waiting out up to `MAX_RATE_LIMIT_RETRIES` rate limits.
    /// Any other non-success status fails immediately.
    async fn send(&self, mut request: RequestBuilder, what: &str) -> Result<String> {
        let mut retries = 0;

        loop {
            let retry = request.try_clone();
            let response = request.send().await.map_err(AppError::fetch)?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RATE_LIMIT_RETRIES {
                if let Some(next) = retry {
                    let header = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body = response.text().await.unwrap_or_default();
                    let delay = retry_after(header.as_deref(), &body);

                    retries += 1;
                    tracing::warn!(
                        request = what,
                        attempt = retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    request = next;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(AppError::fetch_status(what, status));
            }
            return response.text().await.map_err(AppError::fetch);
        }
    }

    /// Re-list the guild's text channels into the name → id cache.
    async fn refresh_channels(&self) -> Result<()> {
        let path = format!("/guilds/{}/channels", self.guild_id);
        let body = self.send(self.get(&path), &path).await?;
        let wire: Vec<WireChannel> = serde_json::from_str(&body).map_err(AppError::json_parse)?;
        let map: HashMap<String, String> = wire
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT)
            .filter_map(|c| c.name.map(|name| (name, c.id)))
            .collect();

        tracing::debug!(guild = self.guild_id, channels = map.len(), "Resolved guild channels");
        *self.channels.write().await = map;
        Ok(())
    }

    async fn cached_channel_id(&self, name: &str) -> Option<String> {
        self.channels.read().await.get(name).cloned()
    }

    async fn post_embed(&self, channel_name: &str, embed: serde_json::Value) -> Result<()> {
        let channel = self.channel_by_name(channel_name).await?;
        let path = format!("/channels/{}/messages", channel.id);
        let request = self
            .client
            .post(format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "embeds": [embed] }));
        self.send(request, &path).await?;
        Ok(())
    }

    /// Post a yellow warning embed to `channel_name`.
    ///
    /// # Errors
    /// Returns error if the channel is unknown or the request fails.
    pub async fn post_warning(&self, channel_name: &str, text: &str) -> Result<()> {
        self.post_embed(
            channel_name,
            json!({ "title": "**Warning**", "description": text, "color": WARNING_COLOR }),
        )
        .await
    }

    /// Post a plain notice embed to `channel_name`.
    ///
    /// # Errors
    /// Returns error if the channel is unknown or the request fails.
    pub async fn post_notice(&self, channel_name: &str, text: &str) -> Result<()> {
        self.post_embed(channel_name, json!({ "description": text })).await
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn channel_by_name(&self, name: &str) -> Result<ChannelHandle> {
        // A miss may be a channel created or renamed since the last listing.
        let id = match self.cached_channel_id(name).await {
            Some(id) => id,
            None => {
                self.refresh_channels().await?;
                self.cached_channel_id(name)
                    .await
                    .ok_or_else(|| AppError::config(format!("Unknown channel: {name}")))?
            }
        };
        Ok(ChannelHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn history_page(
        &self,
        channel: &ChannelHandle,
        request: &HistoryPageRequest,
    ) -> Result<Vec<Message>> {
        let path = format!("/channels/{}/messages", channel.id);
        let mut query = vec![("limit", request.limit.clamp(1, PAGE_SIZE).to_string())];
        if request.oldest_first {
            let after = request
                .after
                .as_ref()
                .map_or_else(|| "0".to_string(), anchor_param);
            query.push(("after", after));
        } else if let Some(before) = &request.before {
            query.push(("before", anchor_param(before)));
        }

        let body = self.send(self.get(&path).query(&query), &path).await?;
        let mut messages = decode_messages(&body)?;

        // Discord returns newest first regardless of direction.
        if request.oldest_first {
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        } else {
            messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        }

        tracing::debug!(channel = %channel.name, count = messages.len(), "Fetched history page");
        Ok(messages)
    }
}
