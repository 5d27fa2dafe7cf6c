//! In-memory fakes for the platform, downloader and notifier seams.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AppError, Attachment, Author, ChannelHandle, Embed, Message, Result};

use super::ports::{Anchor, ChatPlatform, Downloader, HistoryPageRequest, Notifier};

/// Parse an RFC 3339 timestamp.
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

/// A plain text message.
pub fn text_message(id: &str, author: &str, content: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        author: Author {
            display_name: author.to_string(),
            color: None,
        },
        content: content.to_string(),
        created_at,
        edited_at: None,
        attachments: Vec::new(),
        embeds: Vec::new(),
    }
}

/// An attachment with the given URL and content type.
pub fn attachment(url: &str, content_type: Option<&str>) -> Attachment {
    Attachment {
        url: url.to_string(),
        content_type: content_type.map(String::from),
        filename: url.rsplit('/').next().unwrap_or_default().to_string(),
    }
}

/// Builder helpers for test messages.
pub trait MessageExt {
    fn edited(self, at: DateTime<Utc>) -> Self;
    fn with_attachment(self, attachment: Attachment) -> Self;
    fn with_embed(self, embed: Embed) -> Self;
}

impl MessageExt for Message {
    fn edited(mut self, at: DateTime<Utc>) -> Self {
        self.edited_at = Some(at);
        self
    }

    fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// Chat platform backed by per-channel message lists (ascending by creation).
#[derive(Default)]
pub struct FakePlatform {
    channels: HashMap<String, Vec<Message>>,
    requests: Mutex<Vec<(String, HistoryPageRequest)>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: &str, mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.created_at);
        self.channels.insert(name.to_string(), messages);
        self
    }

    /// Number of page requests served so far.
    pub fn page_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Channel names in the order their history was first requested.
    pub fn channels_visited(&self) -> Vec<String> {
        let mut visited: Vec<String> = Vec::new();
        for (name, _) in self.requests.lock().unwrap().iter() {
            if !visited.contains(name) {
                visited.push(name.clone());
            }
        }
        visited
    }

    fn position(messages: &[Message], id: &str) -> Option<usize> {
        messages.iter().position(|m| m.id == id)
    }

    fn is_after(messages: &[Message], index: usize, anchor: &Anchor) -> bool {
        match anchor {
            Anchor::Time(t) => messages[index].created_at >= *t,
            Anchor::Message(id) => Self::position(messages, id).is_some_and(|p| index > p),
        }
    }

    fn is_before(messages: &[Message], index: usize, anchor: &Anchor) -> bool {
        match anchor {
            Anchor::Time(t) => messages[index].created_at < *t,
            Anchor::Message(id) => Self::position(messages, id).is_some_and(|p| index < p),
        }
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn channel_by_name(&self, name: &str) -> Result<ChannelHandle> {
        if self.channels.contains_key(name) {
            Ok(ChannelHandle {
                id: format!("id-{name}"),
                name: name.to_string(),
            })
        } else {
            Err(AppError::config(format!("Unknown channel: {name}")))
        }
    }

    async fn history_page(
        &self,
        channel: &ChannelHandle,
        request: &HistoryPageRequest,
    ) -> Result<Vec<Message>> {
        self.requests
            .lock()
            .unwrap()
            .push((channel.name.clone(), request.clone()));

        let messages = self
            .channels
            .get(&channel.name)
            .ok_or_else(|| AppError::config(format!("Unknown channel: {}", channel.name)))?;

        // Like Discord, only the bound in the paging direction is honored.
        if request.oldest_first {
            Ok((0..messages.len())
                .filter(|&i| {
                    request
                        .after
                        .as_ref()
                        .map_or(true, |a| Self::is_after(messages, i, a))
                })
                .take(request.limit)
                .map(|i| messages[i].clone())
                .collect())
        } else {
            Ok((0..messages.len())
                .rev()
                .filter(|&i| {
                    request
                        .before
                        .as_ref()
                        .map_or(true, |b| Self::is_before(messages, i, b))
                })
                .take(request.limit)
                .map(|i| messages[i].clone())
                .collect())
        }
    }
}

/// Downloader that writes a fixed body and records every URL fetched.
#[derive(Default)]
pub struct CountingDownloader {
    fetched: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl CountingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make downloads of `url` fail with a fetch error.
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for CountingDownloader {
    async fn download(&self, url: &str, dest: &Path, _chunk_size: usize) -> Result<u64> {
        {
            self.fetched.lock().unwrap().push(url.to_string());
        }
        if self.failing.iter().any(|u| u == url) {
            return Err(AppError::Fetch {
                message: format!("GET {url} failed"),
                source: None,
            });
        }
        let body = format!("bytes of {url}");
        tokio::fs::write(dest, body.as_bytes())
            .await
            .map_err(|e| AppError::io("Failed to write fake download", e))?;
        Ok(body.len() as u64)
    }
}

/// Notifier that keeps every message it was given.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notice(&self, text: &str) -> Result<()> {
        self.notices.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn warning(&self, text: &str) -> Result<()> {
        self.warnings.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
