//! Streaming HTTP downloads with reqwest.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::application::Downloader;
use crate::domain::{AppError, Result};

/// Downloads attachments chunk by chunk straight to disk.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path, chunk_size: usize) -> Result<u64> {
        let mut response = self.client.get(url).send().await.map_err(AppError::fetch)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch_status(url, status));
        }

        let file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| AppError::io(format!("Failed to create {}", dest.display()), e))?;
        let mut writer = BufWriter::with_capacity(chunk_size, file);

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(AppError::fetch)? {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::io(format!("Failed to write {}", dest.display()), e))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::io(format!("Failed to flush {}", dest.display()), e))?;

        Ok(written)
    }
}
