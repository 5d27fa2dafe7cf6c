//! Application layer - use cases and orchestration.
//!
//! Paging channel history, rendering messages to markdown, storing
//! attachments and driving a whole backup run. External services are
//! reached only through the traits in [`ports`].

pub mod archive_writer;
pub mod attachment_store;
pub mod formatter;
pub mod history;
pub mod orchestrator;
pub mod ports;
pub mod renderer;
pub mod scheduler;

#[cfg(test)]
pub mod testing;

pub use formatter::{format_report_summary, format_report_table, format_spans_table};
pub use history::PAGE_SIZE;
pub use orchestrator::{today, BackupOrchestrator};
pub use ports::{Anchor, ChatPlatform, Downloader, HistoryPageRequest, Notifier};
pub use scheduler::DailySchedule;
