//! Cortana backup - archive Discord channel history to markdown.
//!
//! Walks each configured channel's history and writes it to a local
//! markdown archive in one of three layouts: one file per day, one
//! rolling file per channel, or a full snapshot. Attachments and embed
//! images are downloaded next to the markdown and deduplicated.
//!
//!   cortana-backup backup-daily                 # yesterday, every channel
//!   cortana-backup backup-range 230101 230201   # explicit range (end exclusive)
//!   cortana-backup backup-range                 # everything up to today
//!   cortana-backup channels                     # first/last message per channel
//!   cortana-backup daemon                       # daily run at [daily].time
//!   cortana-backup service install              # keep the daemon running

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_report_summary, format_report_table, format_spans_table, today, BackupOrchestrator,
    DailySchedule,
};
use cli::{Cli, Commands, ServiceAction};
use domain::{parse_date, AppConfig, ChannelPlan};
use infrastructure::{
    build_http_client, ensure_config_exists, load_config, load_config_from_file, DiscordClient,
    DiscordNotifier, HttpDownloader, SystemdService,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from_file(path)?,
        None => load_config()?,
    };

    match cli.command {
        Commands::BackupDaily => cmd_backup_daily(&config).await,
        Commands::BackupRange { start, end } => {
            cmd_backup_range(&config, start.as_deref(), end.as_deref()).await
        }
        Commands::Snapshot { channel } => cmd_snapshot(&config, channel).await,
        Commands::Channels => cmd_channels(&config).await,
        Commands::Daemon => cmd_daemon(&config).await,
        Commands::InitConfig => cmd_init_config(),
        Commands::Paths => {
            cmd_paths(&config);
            Ok(())
        }
        Commands::Service { action } => cmd_service(config, action),
    }
}

/// Live collaborators shared by every run of this process.
struct Connection {
    platform: Arc<DiscordClient>,
    downloader: Arc<HttpDownloader>,
    notifier: Arc<DiscordNotifier>,
}

impl Connection {
    fn open(config: &AppConfig) -> domain::Result<Self> {
        let http = build_http_client(config.discord.proxy.as_deref())?;
        let platform = Arc::new(DiscordClient::from_config(&config.discord, http.clone())?);
        let notifier = Arc::new(DiscordNotifier::new(
            platform.clone(),
            config.discord.report_channel.clone(),
        ));

        Ok(Self {
            platform,
            downloader: Arc::new(HttpDownloader::new(http)),
            notifier,
        })
    }

    /// A fresh orchestrator (and dedup index) for one run.
    fn orchestrator(&self, config: &AppConfig) -> domain::Result<BackupOrchestrator> {
        BackupOrchestrator::new(
            config,
            self.platform.clone(),
            self.downloader.clone(),
            self.notifier.clone(),
        )
    }
}

/// Run one manual backup and print the outcome.
async fn manual_backup(
    config: &AppConfig,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> domain::Result<()> {
    let connection = Connection::open(config)?;
    let report = connection.orchestrator(config)?.run(start, end).await?;

    println!("{}", format_report_table(&report));
    println!();
    println!("{}", format_report_summary(&report));
    Ok(())
}

/// Back up yesterday.
async fn cmd_backup_daily(config: &AppConfig) -> domain::Result<()> {
    let today = today(&config.time_zone()?);
    manual_backup(config, Some(today - Duration::days(1)), Some(today)).await
}

/// Back up an explicit range.
async fn cmd_backup_range(
    config: &AppConfig,
    start: Option<&str>,
    end: Option<&str>,
) -> domain::Result<()> {
    let start = start.map(parse_date).transpose()?;
    let end = end.map(parse_date).transpose()?;
    manual_backup(config, start, end).await
}

/// Snapshot a single channel.
async fn cmd_snapshot(config: &AppConfig, channel: String) -> domain::Result<()> {
    let mut config = config.clone();
    config.channels = ChannelPlan {
        by_date: Vec::new(),
        one_file: Vec::new(),
        snapshot: vec![channel],
    };
    manual_backup(&config, None, None).await
}

/// Show the history span of every configured channel.
async fn cmd_channels(config: &AppConfig) -> domain::Result<()> {
    let connection = Connection::open(config)?;
    let spans = connection.orchestrator(config)?.survey().await?;
    println!("{}", format_spans_table(&spans));
    Ok(())
}

/// Back up yesterday every day at the configured time, until Ctrl-C.
async fn cmd_daemon(config: &AppConfig) -> domain::Result<()> {
    let schedule = DailySchedule::new(config.daily_time()?, config.time_zone()?);
    let connection = Connection::open(config)?;

    println!(
        "{} Daily backup scheduled at {} (UTC{:+})",
        "⏰".bold(),
        config.daily.time.cyan(),
        config.timezone
    );

    loop {
        let fired = tokio::select! {
            fired = schedule.wait() => fired?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
        };

        let (start, end) = schedule.window_for(fired);
        let orchestrator = connection
            .orchestrator(config)?
            .with_today(end)
            .with_failure_label("Daily backup");

        // Already logged and posted by the orchestrator; keep the loop alive.
        if let Ok(report) = orchestrator.run(Some(start), Some(end)).await {
            tracing::info!(
                channels = report.outcomes.len(),
                messages = report.total_messages(),
                "Daily backup done"
            );
        }
    }
}

/// Write the default configuration file.
fn cmd_init_config() -> domain::Result<()> {
    let (path, created) = ensure_config_exists()?;
    if created {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("{} already exists", path.display());
    }
    Ok(())
}

/// Show configuration and archive paths.
fn cmd_paths(config: &AppConfig) {
    println!("{}", "📂 Cortana Backup Paths".bold());
    println!();
    println!("  {} {}", "config:".green(), config.config_file_path().display());
    println!("  {} {}", "data:  ".green(), config.data_dir().display());
    println!("  {} {}", "backup:".green(), config.backup_root().display());
    println!();
    println!("  {} {}", "by date: ".blue(), config.channels.by_date.join(", "));
    println!("  {} {}", "one file:".blue(), config.channels.one_file.join(", "));
    println!("  {} {}", "snapshot:".blue(), config.channels.snapshot.join(", "));
}

/// Manage the systemd user service.
fn cmd_service(config: AppConfig, action: ServiceAction) -> domain::Result<()> {
    let service = SystemdService::new(config);

    match action {
        ServiceAction::Install => {
            let path = service.install()?;
            println!("{} Installed {}", "✓".green().bold(), path.display());
        }
        ServiceAction::Uninstall => {
            service.uninstall()?;
            println!("{} Service removed", "✓".green().bold());
        }
        ServiceAction::Status => println!("{}", service.status()?),
        ServiceAction::Logs { lines } => println!("{}", service.logs(lines)?),
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
