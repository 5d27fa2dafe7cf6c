//! Domain models for archived chat data.
//!
//! These are plain read-only values handed to the archiver by the chat
//! platform adapter. Nothing here knows about Discord or HTTP.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Suffix appended to a time label when the effective timestamp is an edit.
pub const EDIT_SUFFIX: &str = "-EDIT";

/// Date format used for archive file names and CLI arguments.
pub const DATE_FORMAT: &str = "%y%m%d";

/// Timestamp format used for entry headings and attachment names.
pub const TIME_LABEL_FORMAT: &str = "%y%m%d-%H%M%S";

/// A resolved remote channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
    /// Platform identifier.
    pub id: String,
    /// Human-readable channel name (as used in configuration).
    pub name: String,
}

/// Message author as displayed in the guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Author {
    /// Display name (nickname or global name).
    pub display_name: String,
    /// Role color, when the platform exposes it.
    #[serde(default)]
    pub color: Option<u32>,
}

/// A file attached directly to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Source URL.
    pub url: String,
    /// Declared MIME type, if any.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Platform file name.
    #[serde(default)]
    pub filename: String,
}

impl Attachment {
    /// Whether the declared content type marks this as an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image"))
    }
}

/// Kind of embed attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    Rich,
    Link,
    Image,
    /// Video, gifv, article and anything else; not archived.
    Other,
}

impl From<&str> for EmbedKind {
    fn from(value: &str) -> Self {
        match value {
            "rich" => Self::Rich,
            "link" => Self::Link,
            "image" => Self::Image,
            _ => Self::Other,
        }
    }
}

/// Embedded rich content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub kind: EmbedKind,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Outbound link.
    #[serde(default)]
    pub url: Option<String>,
    /// Full-size image (rich/link embeds).
    #[serde(default)]
    pub image_url: Option<String>,
    /// Proxied thumbnail (image embeds).
    #[serde(default)]
    pub thumbnail_proxy_url: Option<String>,
}

impl Embed {
    /// An embed of the given kind with every optional field empty.
    #[cfg(test)]
    #[must_use]
    pub const fn empty(kind: EmbedKind) -> Self {
        Self {
            kind,
            author_name: None,
            title: None,
            description: None,
            url: None,
            image_url: None,
            thumbnail_proxy_url: None,
        }
    }
}

/// A single remote message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Platform identifier, used as a pagination anchor.
    pub id: String,
    pub author: Author,
    /// Raw text content (may be empty).
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

impl Message {
    /// Edit time if the message was edited, else creation time.
    #[must_use]
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.edited_at.unwrap_or(self.created_at)
    }

    #[must_use]
    pub const fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Heading label for this message in the given time zone,
    /// e.g. `230101-120000` or `230101-121500-EDIT`.
    #[must_use]
    pub fn time_label(&self, tz: &FixedOffset) -> String {
        let local = self.effective_timestamp().with_timezone(tz);
        let mut label = local.format(TIME_LABEL_FORMAT).to_string();
        if self.is_edited() {
            label.push_str(EDIT_SUFFIX);
        }
        label
    }
}

/// Midnight of `date` in `tz`, as a UTC instant.
#[must_use]
pub fn local_midnight(date: NaiveDate, tz: &FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(tz.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}

/// Calendar date of `instant` in `tz`.
#[must_use]
pub fn local_date(instant: DateTime<Utc>, tz: &FixedOffset) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// The day after `date`.
///
/// # Errors
/// Returns error if `date` is the last representable day.
pub fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| AppError::config(format!("No day after {date}")))
}

/// Format a date as `YYMMDD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a `YYMMDD` date argument.
///
/// # Errors
/// Returns a configuration error if the text is not a valid date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| AppError::config(format!("Invalid date '{text}' (expected YYMMDD): {e}")))
}
