//! Backup run over every configured channel.
//!
//! Channels are processed strictly one after another: per-day channels,
//! then rolling-file channels, then snapshots. The first error aborts the
//! run; files of channels already finished stay in place.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::domain::{format_date, local_date, AppConfig, ChannelPlan, Result};

use super::archive_writer::{ArchiveMode, ArchiveOutcome, ArchiveWriter, ATTACHMENTS_DIR};
use super::attachment_store::AttachmentStore;
use super::ports::{ChatPlatform, Downloader, Notifier};
use super::renderer::MessageRenderer;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Start date requested by the caller; `None` means each channel
    /// started from its first message.
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
    pub outcomes: Vec<ArchiveOutcome>,
    /// Channels with no history at all.
    pub skipped: Vec<String>,
}

impl BackupReport {
    /// `YYMMDD` of the start, or `beginning`.
    #[must_use]
    pub fn start_label(&self) -> String {
        self.start.map_or_else(|| "beginning".to_string(), format_date)
    }

    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.outcomes.iter().map(|o| o.messages).sum()
    }
}

/// First and last message dates of one configured channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpan {
    pub channel: String,
    pub mode: ArchiveMode,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Runs one backup over the configured channel plan.
///
/// Consumed by `run`, so every run starts with a fresh dedup index.
pub struct BackupOrchestrator {
    plan: ChannelPlan,
    writer: ArchiveWriter,
    notifier: Arc<dyn Notifier>,
    today: NaiveDate,
    failure_label: String,
}

impl BackupOrchestrator {
    /// Build an orchestrator from configuration and the three collaborators.
    ///
    /// # Errors
    /// Returns error if the configured time zone is invalid.
    pub fn new(
        config: &AppConfig,
        platform: Arc<dyn ChatPlatform>,
        downloader: Arc<dyn Downloader>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let tz = config.time_zone()?;
        let root = config.backup_root();
        let store = AttachmentStore::new(&root, config.backup.chunk_size, downloader);
        let renderer = MessageRenderer::new(store, config.emoji.fate.clone());

        Ok(Self {
            plan: config.channels.clone(),
            writer: ArchiveWriter::new(platform, renderer, root, tz),
            notifier,
            today: today(&tz),
            failure_label: "Backup".to_string(),
        })
    }

    /// Pin "today" (used as the default end date and snapshot file name).
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Prefix of the warning posted when a run fails (`{label} failed: {error}`).
    #[must_use]
    pub fn with_failure_label(mut self, label: impl Into<String>) -> Self {
        self.failure_label = label.into();
        self
    }

    /// Back up every configured channel over `[start, end)`.
    ///
    /// A failure is posted to the notifier as a warning before it is
    /// returned.
    ///
    /// # Errors
    /// Returns the first error raised by any channel; later channels are
    /// not processed.
    pub async fn run(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<BackupReport> {
        let end = end.unwrap_or(self.today);
        let mut report = BackupReport {
            start,
            end,
            outcomes: Vec::new(),
            skipped: Vec::new(),
        };

        match self.run_channels(&mut report).await {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::error!("{} failed: {e}", self.failure_label);
                let warning = format!("{} failed: {e}", self.failure_label);
                if let Err(notify_err) = self.notifier.warning(&warning).await {
                    tracing::error!("Failed to post warning: {notify_err}");
                }
                Err(e)
            }
        }
    }

    async fn run_channels(&mut self, report: &mut BackupReport) -> Result<()> {
        let (start, end) = (report.start, report.end);

        self.notifier
            .notice(&format!(
                "Start backing up from {} to {}",
                report.start_label(),
                format_date(end)
            ))
            .await?;

        for channel in self.plan.by_date.clone() {
            let Some(from) = self.resolve_start(&channel, start, report).await? else {
                continue;
            };
            let outcome = self
                .writer
                .backup_by_date(&channel, from, end, &channel, ATTACHMENTS_DIR)
                .await?;
            report.outcomes.push(outcome);
        }

        for channel in self.plan.one_file.clone() {
            let Some(from) = self.resolve_start(&channel, start, report).await? else {
                continue;
            };
            let att_dir = format!("{ATTACHMENTS_DIR}/{channel}");
            let outcome = self
                .writer
                .backup_in_one_file(&channel, from, end, "", &att_dir)
                .await?;
            report.outcomes.push(outcome);
        }

        for channel in self.plan.snapshot.clone() {
            let outcome = self.writer.snapshot(&channel, self.today).await?;
            report.outcomes.push(outcome);
        }

        tracing::info!(
            channels = report.outcomes.len(),
            messages = report.total_messages(),
            "Backup finished"
        );
        self.notifier
            .notice(&format!(
                "Backup from {} to {} finished",
                report.start_label(),
                format_date(end)
            ))
            .await?;

        Ok(())
    }

    /// First and last message dates of every configured channel, in run order.
    ///
    /// # Errors
    /// Returns error if a channel is unknown or its history cannot be fetched.
    pub async fn survey(&self) -> Result<Vec<ChannelSpan>> {
        let modes = [
            (ArchiveMode::ByDate, &self.plan.by_date),
            (ArchiveMode::OneFile, &self.plan.one_file),
            (ArchiveMode::Snapshot, &self.plan.snapshot),
        ];

        let mut spans = Vec::new();
        for (mode, channels) in modes {
            for channel in channels {
                spans.push(ChannelSpan {
                    channel: channel.clone(),
                    mode,
                    first: self.writer.earliest_date(channel).await?,
                    last: self.writer.latest_date(channel).await?,
                });
            }
        }
        Ok(spans)
    }

    /// The caller's start date, or this channel's first message date.
    async fn resolve_start(
        &self,
        channel: &str,
        start: Option<NaiveDate>,
        report: &mut BackupReport,
    ) -> Result<Option<NaiveDate>> {
        if start.is_some() {
            return Ok(start);
        }
        let earliest = self.writer.earliest_date(channel).await?;
        if earliest.is_none() {
            tracing::warn!(channel, "Channel has no messages, skipping");
            report.skipped.push(channel.to_string());
        }
        Ok(earliest)
    }
}

/// Today's date in `tz`.
#[must_use]
pub fn today(tz: &FixedOffset) -> NaiveDate {
    local_date(Utc::now(), tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{
        at, attachment, text_message, CountingDownloader, FakePlatform, MessageExt, RecordingNotifier,
    };
    use crate::domain::AppError;
    use tempfile::{tempdir, TempDir};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config(dir: &TempDir, plan: ChannelPlan) -> AppConfig {
        let mut config = AppConfig::default();
        config.backup.local_folder = Some(dir.path().to_path_buf());
        config.channels = plan;
        config
    }

    fn plan(by_date: &[&str], one_file: &[&str], snapshot: &[&str]) -> ChannelPlan {
        let names = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        ChannelPlan {
            by_date: names(by_date),
            one_file: names(one_file),
            snapshot: names(snapshot),
        }
    }

    fn platform() -> FakePlatform {
        FakePlatform::new()
            .with_channel(
                "chat",
                vec![
                    text_message("1", "nouvee", "old", at("2023-01-01T10:00:00+08:00")),
                    text_message("2", "nouvee", "new", at("2023-01-03T10:00:00+08:00")),
                ],
            )
            .with_channel(
                "gallery",
                vec![text_message("3", "charys117", "art", at("2023-01-02T10:00:00+08:00"))],
            )
            .with_channel(
                "badge",
                vec![text_message("4", "nouvee", "medal", at("2022-12-01T10:00:00+08:00"))],
            )
            .with_channel("quiet", Vec::new())
    }

    #[tokio::test]
    async fn test_run_resolves_start_per_channel() {
        let dir = tempdir().unwrap();
        let config = config(&dir, plan(&["chat"], &["gallery", "quiet"], &["badge"]));
        let platform = Arc::new(platform());
        let notifier = Arc::new(RecordingNotifier::default());

        let report = BackupOrchestrator::new(
            &config,
            platform.clone(),
            Arc::new(CountingDownloader::new()),
            notifier.clone(),
        )
        .unwrap()
        .with_today(day(2023, 1, 4))
        .run(None, None)
        .await
        .unwrap();

        assert_eq!(report.end, day(2023, 1, 4));
        assert_eq!(report.skipped, vec!["quiet"]);
        assert!(dir.path().join("chat/230101.md").is_file());
        assert!(!dir.path().join("chat/230102.md").exists());
        assert!(dir.path().join("chat/230103.md").is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("gallery.md")).unwrap(),
            "#### charys117-230102-100000\nart"
        );
        assert!(!dir.path().join("quiet.md").exists());
        assert!(dir.path().join("badge/230104.md").is_file());

        let starts: Vec<_> = report.outcomes.iter().map(|o| o.start).collect();
        assert_eq!(starts, vec![Some(day(2023, 1, 1)), Some(day(2023, 1, 2)), None]);

        let modes: Vec<_> = report.outcomes.iter().map(|o| o.mode).collect();
        assert_eq!(modes, vec![ArchiveMode::ByDate, ArchiveMode::OneFile, ArchiveMode::Snapshot]);
        assert_eq!(report.total_messages(), 4);
        assert_eq!(
            notifier.notices(),
            vec![
                "Start backing up from beginning to 230104",
                "Backup from beginning to 230104 finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_with_explicit_range() {
        let dir = tempdir().unwrap();
        let config = config(&dir, plan(&["chat"], &["gallery"], &[]));

        let report = BackupOrchestrator::new(
            &config,
            Arc::new(platform()),
            Arc::new(CountingDownloader::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap()
        .run(Some(day(2023, 1, 3)), Some(day(2023, 1, 4)))
        .await
        .unwrap();

        assert_eq!(report.start_label(), "230103");
        assert!(!dir.path().join("chat/230101.md").exists());
        assert!(dir.path().join("chat/230103.md").is_file());
        assert!(!dir.path().join("gallery.md").exists());
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_channels() {
        let dir = tempdir().unwrap();
        let config = config(&dir, plan(&["chat", "missing"], &["gallery"], &["badge"]));
        let platform = Arc::new(platform());
        let notifier = Arc::new(RecordingNotifier::default());

        let err = BackupOrchestrator::new(
            &config,
            platform.clone(),
            Arc::new(CountingDownloader::new()),
            notifier.clone(),
        )
        .unwrap()
        .with_today(day(2023, 1, 4))
        .run(Some(day(2023, 1, 1)), None)
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Config { .. }));
        assert!(dir.path().join("chat/230101.md").is_file());
        assert!(!dir.path().join("gallery.md").exists());
        assert!(!dir.path().join("badge").exists());
        assert_eq!(platform.channels_visited(), vec!["chat"]);
        assert_eq!(notifier.notices().len(), 1);
        assert_eq!(notifier.warnings().len(), 1);
        assert!(notifier.warnings()[0].starts_with("Backup failed: Configuration error"));
    }

    #[tokio::test]
    async fn test_download_failure_reaches_notifier() {
        let dir = tempdir().unwrap();
        let broken = "https://cdn.example.com/broken.png";
        let platform = FakePlatform::new().with_channel(
            "chat",
            vec![
                text_message("1", "nouvee", "ok", at("2023-01-01T10:00:00+08:00")),
                text_message("2", "nouvee", "pic", at("2023-01-02T10:00:00+08:00"))
                    .with_attachment(attachment(broken, Some("image/png"))),
            ],
        );
        let config = config(&dir, plan(&["chat"], &[], &[]));
        let notifier = Arc::new(RecordingNotifier::default());

        let err = BackupOrchestrator::new(
            &config,
            Arc::new(platform),
            Arc::new(CountingDownloader::new().failing_on(broken)),
            notifier.clone(),
        )
        .unwrap()
        .run(Some(day(2023, 1, 1)), Some(day(2023, 1, 3)))
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Fetch { .. }));
        assert!(dir.path().join("chat/230101.md").is_file());
        assert!(!dir.path().join("chat/230102.md").exists());
        assert_eq!(
            notifier.warnings(),
            vec![format!("Backup failed: Fetch error: GET {broken} failed")]
        );
    }

    #[tokio::test]
    async fn test_failure_label_prefixes_warning() {
        let dir = tempdir().unwrap();
        let config = config(&dir, plan(&["missing"], &[], &[]));
        let notifier = Arc::new(RecordingNotifier::default());

        let result = BackupOrchestrator::new(
            &config,
            Arc::new(platform()),
            Arc::new(CountingDownloader::new()),
            notifier.clone(),
        )
        .unwrap()
        .with_failure_label("Daily backup")
        .run(Some(day(2023, 1, 1)), Some(day(2023, 1, 2)))
        .await;

        assert!(result.is_err());
        assert_eq!(notifier.warnings().len(), 1);
        assert!(notifier.warnings()[0].starts_with("Daily backup failed: "));
    }

    #[tokio::test]
    async fn test_survey_reports_first_and_last_dates() {
        let dir = tempdir().unwrap();
        let config = config(&dir, plan(&["chat"], &["quiet"], &["badge"]));

        let orchestrator = BackupOrchestrator::new(
            &config,
            Arc::new(platform()),
            Arc::new(CountingDownloader::new()),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap();
        let spans = orchestrator.survey().await.unwrap();

        assert_eq!(
            spans,
            vec![
                ChannelSpan {
                    channel: "chat".into(),
                    mode: ArchiveMode::ByDate,
                    first: Some(day(2023, 1, 1)),
                    last: Some(day(2023, 1, 3)),
                },
                ChannelSpan {
                    channel: "quiet".into(),
                    mode: ArchiveMode::OneFile,
                    first: None,
                    last: None,
                },
                ChannelSpan {
                    channel: "badge".into(),
                    mode: ArchiveMode::Snapshot,
                    first: Some(day(2022, 12, 1)),
                    last: Some(day(2022, 12, 1)),
                },
            ]
        );
    }
}
