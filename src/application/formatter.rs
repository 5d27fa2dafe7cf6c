//! Terminal output for backup results.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::format_date;

use super::orchestrator::{BackupReport, ChannelSpan};

/// Per-channel table of a finished run.
pub fn format_report_table(report: &BackupReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Channel", "Mode", "From", "Msgs", "Files"]);

    for outcome in &report.outcomes {
        let files = match outcome.files.len() {
            0 => "-".to_string(),
            1 => outcome.files[0]
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
            n => format!("{n} files"),
        };
        table.add_row(vec![
            outcome.channel.clone(),
            outcome.mode.to_string(),
            outcome.start.map_or_else(|| "-".to_string(), format_date),
            outcome.messages.to_string(),
            files,
        ]);
    }

    for channel in &report.skipped {
        table.add_row(vec![
            channel.clone(),
            "skipped".to_string(),
            "-".to_string(),
            "0".to_string(),
            "-".to_string(),
        ]);
    }

    table.to_string()
}

/// One-line summary of a finished run.
pub fn format_report_summary(report: &BackupReport) -> String {
    format!(
        "{} Backup from {} to {}: {} channels, {} messages",
        "✓".green().bold(),
        report.start_label().cyan(),
        format_date(report.end).cyan(),
        report.outcomes.len().to_string().yellow(),
        report.total_messages().to_string().yellow()
    )
}

/// First and last message dates per configured channel.
pub fn format_spans_table(spans: &[ChannelSpan]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Channel", "Mode", "First", "Last"]);

    let date = |d: Option<chrono::NaiveDate>| d.map_or_else(|| "-".to_string(), format_date);
    for span in spans {
        table.add_row(vec![
            span.channel.clone(),
            span.mode.to_string(),
            date(span.first),
            date(span.last),
        ]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;
    use crate::application::archive_writer::{ArchiveMode, ArchiveOutcome};

    fn report() -> BackupReport {
        BackupReport {
            start: None,
            end: NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
            outcomes: vec![
                ArchiveOutcome {
                    channel: "chat".into(),
                    mode: ArchiveMode::ByDate,
                    start: Some(NaiveDate::from_ymd_opt(2022, 12, 30).unwrap()),
                    messages: 12,
                    files: vec![PathBuf::from("chat/230101.md"), PathBuf::from("chat/230103.md")],
                },
                ArchiveOutcome {
                    channel: "badge".into(),
                    mode: ArchiveMode::Snapshot,
                    start: None,
                    messages: 3,
                    files: vec![PathBuf::from("badge/230104.md")],
                },
            ],
            skipped: vec!["quiet".into()],
        }
    }

    #[test]
    fn test_report_table_lists_channels() {
        let table = format_report_table(&report());
        assert!(table.contains("chat"));
        assert!(table.contains("2 files"));
        assert!(table.contains("221230"));
        assert!(table.contains("230104.md"));
        assert!(table.contains("skipped"));
    }

    #[test]
    fn test_report_summary_counts() {
        colored::control::set_override(false);
        let summary = format_report_summary(&report());
        assert!(summary.contains("beginning"));
        assert!(summary.contains("230104"));
        assert!(summary.contains("15 messages"));
    }

    #[test]
    fn test_spans_table_marks_empty_channels() {
        let spans = vec![ChannelSpan {
            channel: "quiet".into(),
            mode: ArchiveMode::OneFile,
            first: None,
            last: None,
        }];
        let table = format_spans_table(&spans);
        assert!(table.contains("quiet"));
        assert!(table.contains("one-file"));
        assert!(table.contains(" - "));
    }
}
