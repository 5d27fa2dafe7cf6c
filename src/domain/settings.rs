//! Backup configuration.
//!
//! One immutable `AppConfig` is loaded at startup and handed to every
//! component that needs it; nothing reads settings from global state.

use std::path::PathBuf;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Archive storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backup root; defaults to `<data_dir>/backup`.
    #[serde(default)]
    pub local_folder: Option<PathBuf>,

    /// Write buffer size for attachment downloads, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            local_folder: None,
            chunk_size: default_chunk_size(),
        }
    }
}

const fn default_chunk_size() -> usize {
    1024 * 1024
}

/// Emoji normalization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmojiConfig {
    /// Custom emoji token (e.g. `<:fate:1234>`) rewritten to 🔮 in archives.
    /// Empty disables the rewrite.
    #[serde(default)]
    pub fate: String,
}

/// Static assignment of channels to archival modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPlan {
    /// One markdown file per calendar day.
    #[serde(default)]
    pub by_date: Vec<String>,

    /// One rolling file per channel, appended to on every run.
    #[serde(default)]
    pub one_file: Vec<String>,

    /// Full rewrite of the channel into a single dated file.
    #[serde(default)]
    pub snapshot: Vec<String>,
}

impl Default for ChannelPlan {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        Self {
            by_date: names(&["chat", "night"]),
            one_file: names(&[
                "record",
                "tutorials",
                "references",
                "gallery",
                "food",
                "meme",
                "game",
                "animals",
                "video",
                "music",
            ]),
            snapshot: names(&["badge", "bonus", "a-board", "c-board"]),
        }
    }
}

/// Discord connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Guild whose text channels are archived.
    #[serde(default)]
    pub guild_id: u64,

    /// Environment variable holding the bot token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Optional HTTP(S) proxy for both API calls and downloads.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Channel that receives progress and failure notices.
    #[serde(default = "default_report_channel")]
    pub report_channel: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            guild_id: 0,
            token_env: default_token_env(),
            api_base: default_api_base(),
            proxy: None,
            report_channel: default_report_channel(),
        }
    }
}

fn default_token_env() -> String {
    "CORTANA_TOKEN".into()
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".into()
}

fn default_report_channel() -> String {
    "chat".into()
}

/// Scheduled daily run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    /// Local wall-clock time of the run, `HH:MM`.
    #[serde(default = "default_daily_time")]
    pub time: String,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            time: default_daily_time(),
        }
    }
}

fn default_daily_time() -> String {
    "00:00".into()
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Whole-hour UTC offset of the archive's local time zone.
    #[serde(default = "default_timezone")]
    pub timezone: i32,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub emoji: EmojiConfig,

    #[serde(default)]
    pub channels: ChannelPlan,

    #[serde(default)]
    pub discord: DiscordConfig,

    #[serde(default)]
    pub daily: DailyConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            backup: BackupConfig::default(),
            emoji: EmojiConfig::default(),
            channels: ChannelPlan::default(),
            discord: DiscordConfig::default(),
            daily: DailyConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

const fn default_timezone() -> i32 {
    8
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cortana-backup")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Root directory of the markdown archive.
    #[must_use]
    pub fn backup_root(&self) -> PathBuf {
        self.backup
            .local_folder
            .clone()
            .unwrap_or_else(|| self.data_dir().join("backup"))
    }

    /// The configured local time zone.
    ///
    /// # Errors
    /// Returns error if the offset is outside ±23 hours.
    pub fn time_zone(&self) -> Result<FixedOffset> {
        self.timezone
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| AppError::config(format!("Invalid timezone offset: {}", self.timezone)))
    }

    /// Local time of the scheduled daily run.
    ///
    /// # Errors
    /// Returns error if `daily.time` is not `HH:MM`.
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily.time, "%H:%M").map_err(|e| {
            AppError::config(format!("Invalid daily time '{}': {e}", self.daily.time))
        })
    }
}
