//! Infrastructure layer - external adapters (Discord, HTTP, filesystem, systemd).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod discord;
pub mod downloader;
pub mod notifier;
pub mod systemd;

pub use config::{ensure_config_exists, load_config, load_config_from_file};
pub use discord::{build_http_client, DiscordClient};
pub use downloader::HttpDownloader;
pub use notifier::DiscordNotifier;
pub use systemd::SystemdService;
