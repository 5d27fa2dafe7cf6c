//! The three archival strategies: per-day files, one rolling file, and a
//! full snapshot.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::io::AsyncWriteExt;

use crate::domain::{
    format_date, local_date, local_midnight, next_day, AppError, ChannelHandle, Result,
};

use super::attachment_store::resolve_path;
use super::history::{earliest_message, latest_message, HistoryCursor, HistoryQuery};
use super::ports::ChatPlatform;
use super::renderer::MessageRenderer;

/// Subdirectory (under the markdown directory) that holds attachments.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// How a channel is archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    ByDate,
    OneFile,
    Snapshot,
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByDate => write!(f, "by-date"),
            Self::OneFile => write!(f, "one-file"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// What one archival call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub channel: String,
    pub mode: ArchiveMode,
    /// First day covered; `None` for snapshots, which cover everything.
    pub start: Option<NaiveDate>,
    /// Messages rendered.
    pub messages: usize,
    /// Markdown files created, overwritten or appended to.
    pub files: Vec<PathBuf>,
}

impl ArchiveOutcome {
    fn new(channel: &str, mode: ArchiveMode) -> Self {
        Self {
            channel: channel.to_string(),
            mode,
            start: None,
            messages: 0,
            files: Vec::new(),
        }
    }
}

/// Rendered content of one history window.
struct WindowContent {
    markdown: String,
    messages: usize,
}

/// Writes channel history into the markdown archive.
pub struct ArchiveWriter {
    platform: Arc<dyn ChatPlatform>,
    renderer: MessageRenderer,
    root: PathBuf,
    tz: FixedOffset,
}

impl ArchiveWriter {
    #[must_use]
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        renderer: MessageRenderer,
        root: impl Into<PathBuf>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            platform,
            renderer,
            root: root.into(),
            tz,
        }
    }

    /// Local date of the channel's first message, if it has any.
    ///
    /// # Errors
    /// Returns error if the channel is unknown or history cannot be fetched.
    pub async fn earliest_date(&self, channel_name: &str) -> Result<Option<NaiveDate>> {
        let channel = self.platform.channel_by_name(channel_name).await?;
        let first = earliest_message(self.platform.as_ref(), channel).await?;
        Ok(first.map(|m| local_date(m.created_at, &self.tz)))
    }

    /// Local date of the channel's most recent message, if it has any.
    ///
    /// # Errors
    /// Returns error if the channel is unknown or history cannot be fetched.
    pub async fn latest_date(&self, channel_name: &str) -> Result<Option<NaiveDate>> {
        let channel = self.platform.channel_by_name(channel_name).await?;
        let last = latest_message(self.platform.as_ref(), channel).await?;
        Ok(last.map(|m| local_date(m.created_at, &self.tz)))
    }

    /// Rewrite `{channel}/{today}.md` with the channel's entire history.
    ///
    /// # Errors
    /// Propagates fetch, render and write errors.
    pub async fn snapshot(&mut self, channel_name: &str, today: NaiveDate) -> Result<ArchiveOutcome> {
        let md_dir = channel_name;
        let att_dir = format!("{ATTACHMENTS_DIR}/{channel_name}");
        let file_path = resolve_path(&self.root, &[md_dir, &format!("{}.md", format_date(today))]);

        tracing::info!(channel = channel_name, "Taking snapshot");
        let channel = self.platform.channel_by_name(channel_name).await?;
        create_parent(&file_path).await?;

        let content = self
            .render_window(&channel, HistoryQuery::all(), md_dir, &att_dir)
            .await?;
        write_file(&file_path, &content.markdown).await?;

        let mut outcome = ArchiveOutcome::new(channel_name, ArchiveMode::Snapshot);
        outcome.messages = content.messages;
        outcome.files.push(file_path);
        Ok(outcome)
    }

    /// Append the messages of `[start, end)` to `{md_dir}/{channel}.md`.
    ///
    /// Writes nothing at all when the window is empty.
    ///
    /// # Errors
    /// Propagates fetch, render and write errors.
    pub async fn backup_in_one_file(
        &mut self,
        channel_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        md_dir: &str,
        att_dir: &str,
    ) -> Result<ArchiveOutcome> {
        tracing::info!(
            channel = channel_name,
            start = %format_date(start),
            end = %format_date(end),
            "Start backing up into one file"
        );
        let mut outcome = ArchiveOutcome::new(channel_name, ArchiveMode::OneFile);
        outcome.start = Some(start);
        let channel = self.platform.channel_by_name(channel_name).await?;
        let file_path = resolve_path(&self.root, &[md_dir, &format!("{channel_name}.md")]);

        let needs_newline = tokio::fs::metadata(&file_path)
            .await
            .is_ok_and(|meta| meta.len() > 0);

        let query = HistoryQuery::window(self.midnight(start), self.midnight(end));
        let content = self.render_window(&channel, query, md_dir, att_dir).await?;
        if content.messages == 0 {
            return Ok(outcome);
        }

        create_parent(&file_path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .map_err(|e| AppError::io(format!("Failed to open {}", file_path.display()), e))?;
        if needs_newline {
            file.write_all(b"\n")
                .await
                .map_err(|e| AppError::io(format!("Failed to append to {}", file_path.display()), e))?;
        }
        file.write_all(content.markdown.as_bytes())
            .await
            .map_err(|e| AppError::io(format!("Failed to append to {}", file_path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| AppError::io(format!("Failed to flush {}", file_path.display()), e))?;

        outcome.messages = content.messages;
        outcome.files.push(file_path);
        Ok(outcome)
    }

    /// Write one `{md_dir}/{YYMMDD}.md` per non-empty day in `[start, end)`.
    ///
    /// Days are fetched one at a time, so a failure on one day leaves the
    /// files of earlier days intact.
    ///
    /// # Errors
    /// Propagates fetch, render and write errors.
    pub async fn backup_by_date(
        &mut self,
        channel_name: &str,
        start: NaiveDate,
        end: NaiveDate,
        md_dir: &str,
        att_dir: &str,
    ) -> Result<ArchiveOutcome> {
        tracing::info!(
            channel = channel_name,
            start = %format_date(start),
            end = %format_date(end),
            "Start backing up by date"
        );
        let mut outcome = ArchiveOutcome::new(channel_name, ArchiveMode::ByDate);
        outcome.start = Some(start);
        let channel = self.platform.channel_by_name(channel_name).await?;
        let md_path = resolve_path(&self.root, &[md_dir]);
        tokio::fs::create_dir_all(&md_path)
            .await
            .map_err(|e| AppError::io(format!("Failed to create {}", md_path.display()), e))?;

        let mut date = start;
        while date < end {
            let tomorrow = next_day(date)?;
            tracing::info!(channel = channel_name, date = %format_date(date), "Backing up day");

            let query = HistoryQuery::window(self.midnight(date), self.midnight(tomorrow));
            let content = self.render_window(&channel, query, md_dir, att_dir).await?;
            if content.messages > 0 {
                let file_path = md_path.join(format!("{}.md", format_date(date)));
                write_file(&file_path, &content.markdown).await?;
                outcome.messages += content.messages;
                outcome.files.push(file_path);
            }

            date = tomorrow;
        }

        Ok(outcome)
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        local_midnight(date, &self.tz)
    }

    /// Render every message of `query` and join the blocks in ascending
    /// effective-timestamp order.
    async fn render_window(
        &mut self,
        channel: &ChannelHandle,
        query: HistoryQuery,
        md_dir: &str,
        att_dir: &str,
    ) -> Result<WindowContent> {
        let mut cursor = HistoryCursor::new(self.platform.as_ref(), channel.clone(), query);
        let mut blocks: Vec<(DateTime<Utc>, String)> = Vec::new();

        while let Some(message) = cursor.next().await? {
            let label = message.time_label(&self.tz);
            let block = self.renderer.render(&message, &label, md_dir, att_dir).await?;
            blocks.push((message.effective_timestamp(), block));
        }

        // Edits can move a message past later ones; the sort is stable so
        // ties keep history order.
        blocks.sort_by_key(|(timestamp, _)| *timestamp);

        Ok(WindowContent {
            messages: blocks.len(),
            markdown: blocks
                .into_iter()
                .map(|(_, block)| block)
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e))?;
    }
    Ok(())
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))?;
    tracing::debug!(file = %path.display(), bytes = content.len(), "Wrote archive file");
    Ok(())
}
