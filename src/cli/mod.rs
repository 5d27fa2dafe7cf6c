//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cortana backup - archive chat channel history to markdown.
#[derive(Parser, Debug)]
#[command(name = "cortana-backup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: ~/.cortana-backup/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up yesterday's messages in every configured channel.
    BackupDaily,

    /// Back up a date range (YYMMDD, end exclusive).
    BackupRange {
        /// First day to back up; each channel starts at its first message if omitted.
        start: Option<String>,

        /// Day after the last one to back up (default: today).
        end: Option<String>,
    },

    /// Rewrite the snapshot file of a single channel.
    Snapshot {
        /// Channel name.
        channel: String,
    },

    /// Show the first and last message date of every configured channel.
    Channels,

    /// Run forever, backing up yesterday at the configured time each day.
    Daemon,

    /// Write a default configuration file if none exists.
    InitConfig,

    /// Show configuration and archive paths.
    Paths,

    /// Manage the systemd user service running the daemon.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ServiceAction {
    /// Install, enable and start the service.
    Install,

    /// Stop, disable and remove the service.
    Uninstall,

    /// Show service status.
    Status,

    /// Show recent service logs.
    Logs {
        /// Number of lines.
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}
