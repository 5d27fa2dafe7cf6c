//! Systemd service integration.
//!
//! Installs a user service that keeps the daily backup daemon running.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use crate::domain::{AppConfig, AppError, Result};

/// Service unit file name.
const SERVICE_NAME: &str = "cortana-backup.service";

/// Systemd user service manager.
pub struct SystemdService {
    config: AppConfig,
}

impl SystemdService {
    #[must_use]
    pub const fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn user_systemd_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::config("Could not determine config directory"))?;

        Ok(config_dir.join("systemd/user"))
    }

    fn service_file_path() -> Result<PathBuf> {
        Ok(Self::user_systemd_dir()?.join(SERVICE_NAME))
    }

    /// Unit file running `daemon` with the token loaded from `<data_dir>/env`.
    fn generate_unit_file(&self) -> Result<String> {
        let binary_path = std::env::current_exe()
            .map_err(|e| AppError::io("Failed to get executable path", e))?;

        Ok(format!(
            r"[Unit]
Description=Cortana channel history backup
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={binary} daemon
EnvironmentFile=-{data_dir}/env
Environment=RUST_LOG=info
Restart=on-failure
RestartSec=60

ProtectSystem=strict
ReadWritePaths={data_dir} {backup_root}
NoNewPrivileges=yes

[Install]
WantedBy=default.target
",
            binary = binary_path.display(),
            data_dir = self.config.data_dir().display(),
            backup_root = self.config.backup_root().display(),
        ))
    }

    fn systemctl(args: &[&str], what: &str) -> Result<()> {
        let status = Command::new("systemctl")
            .arg("--user")
            .args(args)
            .status()
            .map_err(|e| AppError::io(format!("Failed to run systemctl ({what})"), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::config(format!("systemctl failed to {what}")))
        }
    }

    /// Write the unit file, then enable and start it.
    ///
    /// # Errors
    /// Returns error if the unit cannot be written or systemctl fails.
    pub fn install(&self) -> Result<PathBuf> {
        fs::create_dir_all(Self::user_systemd_dir()?)
            .map_err(|e| AppError::io("Failed to create systemd user directory", e))?;

        let service_path = Self::service_file_path()?;
        fs::write(&service_path, self.generate_unit_file()?)
            .map_err(|e| AppError::io("Failed to write service file", e))?;
        tracing::info!(path = %service_path.display(), "Service file written");

        Self::systemctl(&["daemon-reload"], "reload units")?;
        Self::systemctl(&["enable", "--now", SERVICE_NAME], "enable service")?;

        Ok(service_path)
    }

    /// Stop, disable and remove the service.
    ///
    /// # Errors
    /// Returns error if the unit file cannot be removed.
    pub fn uninstall(&self) -> Result<()> {
        if let Err(e) = Self::systemctl(&["disable", "--now", SERVICE_NAME], "disable service") {
            tracing::warn!("Service may not have been fully disabled: {e}");
        }

        let service_path = Self::service_file_path()?;
        if service_path.exists() {
            fs::remove_file(&service_path)
                .map_err(|e| AppError::io("Failed to remove service file", e))?;
        }

        Self::systemctl(&["daemon-reload"], "reload units")?;
        tracing::info!("Service uninstalled");

        Ok(())
    }

    /// Output of `systemctl status`.
    ///
    /// # Errors
    /// Returns error if systemctl cannot be run.
    pub fn status(&self) -> Result<String> {
        if !Self::service_file_path()?.exists() {
            return Ok("not installed".into());
        }

        let output = Command::new("systemctl")
            .args(["--user", "status", SERVICE_NAME, "--no-pager"])
            .output()
            .map_err(|e| AppError::io("Failed to get service status", e))?;

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Last `lines` journal lines of the service.
    ///
    /// # Errors
    /// Returns error if journalctl cannot be run.
    pub fn logs(&self, lines: usize) -> Result<String> {
        let output = Command::new("journalctl")
            .args([
                "--user",
                "-u",
                SERVICE_NAME,
                "-n",
                &lines.to_string(),
                "--no-pager",
            ])
            .output()
            .map_err(|e| AppError::io("Failed to get service logs", e))?;

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
