//! Seams between the archiver and the outside world.
//!
//! The archiver only sees these traits; the Discord and HTTP adapters in
//! `infrastructure` implement them, and tests substitute in-memory fakes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ChannelHandle, Message, Result};

/// A point in a channel's history used to bound a page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// An instant; the transport converts it to its own id space.
    Time(DateTime<Utc>),
    /// A message id previously returned by the transport.
    Message(String),
}

/// One page request against a channel's history.
///
/// When `oldest_first` is set the transport pages forward from `after`
/// and returns messages in ascending order; otherwise it pages backward
/// from `before` and returns them newest first. A transport may ignore
/// the bound opposite to the paging direction; `HistoryCursor` enforces
/// both ends of the window itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPageRequest {
    pub limit: usize,
    pub after: Option<Anchor>,
    pub before: Option<Anchor>,
    pub oldest_first: bool,
}

/// Read access to the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Resolve a configured channel name.
    async fn channel_by_name(&self, name: &str) -> Result<ChannelHandle>;

    /// Fetch a single page of history.
    async fn history_page(
        &self,
        channel: &ChannelHandle,
        request: &HistoryPageRequest,
    ) -> Result<Vec<Message>>;
}

/// Streaming HTTP download.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stream `url` into `dest`, buffering at most `chunk_size` bytes
    /// before each write. Returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path, chunk_size: usize) -> Result<u64>;
}

/// Sink for human-readable progress and failure notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notice(&self, text: &str) -> Result<()>;

    async fn warning(&self, text: &str) -> Result<()>;
}
