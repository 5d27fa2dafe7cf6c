//! Configuration file management.
//!
//! Handles loading and creating TOML configuration files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Cortana backup configuration
# Auto-generated - edit as needed

# Whole-hour UTC offset used for day boundaries and timestamps
timezone = 8

[backup]
# Archive root (optional, defaults to ~/.cortana-backup/backup)
# local_folder = "/srv/cortana/backup"

# Download write buffer in bytes
chunk_size = 1048576

[emoji]
# Custom emoji token rewritten to a crystal ball in archives
fate = ""

[channels]
# One markdown file per day: {channel}/{YYMMDD}.md
by_date = ["chat", "night"]

# One rolling file per channel: {channel}.md
one_file = ["record", "tutorials", "references", "gallery", "food", "meme", "game", "animals", "video", "music"]

# Full rewrite on every run: {channel}/{YYMMDD}.md
snapshot = ["badge", "bonus", "a-board", "c-board"]

[discord]
guild_id = 0

# Environment variable holding the bot token
token_env = "CORTANA_TOKEN"

api_base = "https://discord.com/api/v10"

# proxy = "http://127.0.0.1:7890"

# Channel that receives backup notices and warnings
report_channel = "chat"

[daily]
# Local time of the scheduled backup (HH:MM)
time = "00:00"
"#;

/// Load configuration from the default location, or defaults if absent.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })?;

    // Surface bad values now rather than mid-run.
    config.time_zone()?;
    config.daily_time()?;

    Ok(config)
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns the path and whether it was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<(PathBuf, bool)> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok((config_path, false));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| AppError::io("Failed to create default config", e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");

    Ok((config_path, true))
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}
