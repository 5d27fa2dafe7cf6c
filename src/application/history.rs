//! Lazy, pull-based iteration over a channel's history.
//!
//! A `HistoryCursor` holds at most one transport page at a time, so a
//! channel of any size can be walked without loading it whole.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::{ChannelHandle, Message, Result};

use super::ports::{Anchor, ChatPlatform, HistoryPageRequest};

/// Largest page the transport is asked for.
pub const PAGE_SIZE: usize = 100;

/// What part of a channel's history to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryQuery {
    /// Inclusive lower bound on creation time.
    pub after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on creation time.
    pub before: Option<DateTime<Utc>>,
    /// Maximum number of messages to yield.
    pub limit: Option<usize>,
    pub oldest_first: bool,
}

impl HistoryQuery {
    /// The whole channel, oldest first.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            after: None,
            before: None,
            limit: None,
            oldest_first: true,
        }
    }

    /// The half-open window `[after, before)`, oldest first.
    #[must_use]
    pub const fn window(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            after: Some(after),
            before: Some(before),
            limit: None,
            oldest_first: true,
        }
    }

    /// Only the first message the channel ever had.
    #[must_use]
    pub const fn earliest() -> Self {
        Self {
            after: None,
            before: None,
            limit: Some(1),
            oldest_first: true,
        }
    }

    /// Only the most recent message.
    #[must_use]
    pub const fn latest() -> Self {
        Self {
            after: None,
            before: None,
            limit: Some(1),
            oldest_first: false,
        }
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after.map_or(true, |after| at >= after)
            && self.before.map_or(true, |before| at < before)
    }

    /// Whether `at` lies past the far end of the window in paging order.
    fn is_beyond(&self, at: DateTime<Utc>) -> bool {
        if self.oldest_first {
            self.before.is_some_and(|before| at >= before)
        } else {
            self.after.is_some_and(|after| at < after)
        }
    }
}

/// Cursor over one channel's history.
pub struct HistoryCursor<'a> {
    platform: &'a dyn ChatPlatform,
    channel: ChannelHandle,
    query: HistoryQuery,
    page_size: usize,
    page: VecDeque<Message>,
    next_anchor: Option<Anchor>,
    yielded: usize,
    exhausted: bool,
}

impl<'a> HistoryCursor<'a> {
    #[must_use]
    pub const fn new(
        platform: &'a dyn ChatPlatform,
        channel: ChannelHandle,
        query: HistoryQuery,
    ) -> Self {
        Self {
            platform,
            channel,
            query,
            page_size: PAGE_SIZE,
            page: VecDeque::new(),
            next_anchor: None,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Override the transport page size.
    #[cfg(test)]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    /// Pull the next message, fetching a new page when the buffer runs dry.
    ///
    /// # Errors
    /// Propagates transport errors; the cursor should not be reused after one.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        loop {
            if self.query.limit.is_some_and(|limit| self.yielded >= limit) {
                return Ok(None);
            }

            if let Some(message) = self.page.pop_front() {
                if self.query.is_beyond(message.created_at) {
                    self.page.clear();
                    self.exhausted = true;
                    return Ok(None);
                }
                if !self.query.contains(message.created_at) {
                    continue;
                }
                self.yielded += 1;
                return Ok(Some(message));
            }

            if self.exhausted {
                return Ok(None);
            }

            self.fill_page().await?;
        }
    }

    /// Drain the cursor into a vector.
    ///
    /// # Errors
    /// Propagates transport errors.
    #[cfg(test)]
    pub async fn collect(mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.next().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    async fn fill_page(&mut self) -> Result<()> {
        let remaining = self
            .query
            .limit
            .map_or(self.page_size, |limit| limit.saturating_sub(self.yielded));
        let limit = remaining.min(self.page_size);

        let time_anchor = |t: Option<DateTime<Utc>>| t.map(Anchor::Time);
        let request = if self.query.oldest_first {
            HistoryPageRequest {
                limit,
                after: self
                    .next_anchor
                    .clone()
                    .or_else(|| time_anchor(self.query.after)),
                before: time_anchor(self.query.before),
                oldest_first: true,
            }
        } else {
            HistoryPageRequest {
                limit,
                after: time_anchor(self.query.after),
                before: self
                    .next_anchor
                    .clone()
                    .or_else(|| time_anchor(self.query.before)),
                oldest_first: false,
            }
        };

        let page = self.platform.history_page(&self.channel, &request).await?;
        tracing::trace!(
            channel = %self.channel.name,
            fetched = page.len(),
            "History page"
        );

        if page.len() < limit {
            self.exhausted = true;
        }
        match page.last() {
            Some(last) => self.next_anchor = Some(Anchor::Message(last.id.clone())),
            None => self.exhausted = true,
        }
        self.page.extend(page);

        Ok(())
    }
}

/// The first message a channel ever had.
///
/// # Errors
/// Propagates transport errors.
pub async fn earliest_message(
    platform: &dyn ChatPlatform,
    channel: ChannelHandle,
) -> Result<Option<Message>> {
    HistoryCursor::new(platform, channel, HistoryQuery::earliest())
        .next()
        .await
}

/// The most recent message in a channel.
///
/// # Errors
/// Propagates transport errors.
pub async fn latest_message(
    platform: &dyn ChatPlatform,
    channel: ChannelHandle,
) -> Result<Option<Message>> {
    HistoryCursor::new(platform, channel, HistoryQuery::latest())
        .next()
        .await
}
