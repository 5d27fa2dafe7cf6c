//! Deduplicating attachment storage.
//!
//! Attachments land in `backup_root/markdown_dir/attachment_subdir`. A
//! `DedupIndex` remembers which file names exist in each directory so a
//! re-run never downloads the same file twice.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{AppError, Result};

use super::ports::Downloader;

/// Extension used when a URL carries none.
const FALLBACK_EXTENSION: &str = "bin";

/// File names known to exist, per absolute attachment directory.
///
/// Seeded from a directory listing on first touch and grown after every
/// successful or skipped download. Lives for a single backup run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    known: HashMap<PathBuf, HashSet<String>>,
}

impl DedupIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `dir` has been listed during this run.
    #[must_use]
    pub fn is_seeded(&self, dir: &Path) -> bool {
        self.known.contains_key(dir)
    }

    #[must_use]
    pub fn contains(&self, dir: &Path, filename: &str) -> bool {
        self.known
            .get(dir)
            .is_some_and(|names| names.contains(filename))
    }

    /// List `dir` into the index.
    async fn seed(&mut self, dir: &Path) -> Result<()> {
        let mut names = HashSet::new();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            AppError::io(format!("Failed to list {}", dir.display()), e)
        })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::io(format!("Failed to list {}", dir.display()), e))?
        {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }

        tracing::debug!(dir = %dir.display(), files = names.len(), "Seeded attachment index");
        self.known.insert(dir.to_path_buf(), names);
        Ok(())
    }

    fn record(&mut self, dir: &Path, filename: String) {
        self.known
            .entry(dir.to_path_buf())
            .or_default()
            .insert(filename);
    }
}

/// Stores attachments under the backup root, downloading each at most once.
pub struct AttachmentStore {
    root: PathBuf,
    chunk_size: usize,
    downloader: Arc<dyn Downloader>,
    index: DedupIndex,
}

impl AttachmentStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
            downloader,
            index: DedupIndex::new(),
        }
    }

    /// Store the file at `url` as `{logical_name}.{ext}` and return a
    /// markdown link relative to `markdown_dir`.
    ///
    /// # Errors
    /// Propagates download and filesystem errors. A partially written file
    /// may remain; it is not recorded in the index, so the next run
    /// overwrites it.
    pub async fn store(
        &mut self,
        url: &str,
        logical_name: &str,
        markdown_dir: &str,
        attachment_subdir: &str,
    ) -> Result<String> {
        let abs_dir = resolve_path(&self.root, &[markdown_dir, attachment_subdir]);

        if !self.index.is_seeded(&abs_dir) {
            tokio::fs::create_dir_all(&abs_dir).await.map_err(|e| {
                AppError::io(format!("Failed to create {}", abs_dir.display()), e)
            })?;
            self.index.seed(&abs_dir).await?;
        }

        let filename = format!("{logical_name}.{}", url_extension(url));
        let link = markdown_link(logical_name, attachment_subdir, &filename);

        if self.index.contains(&abs_dir, &filename) {
            tracing::trace!(file = %filename, "Attachment already stored");
            return Ok(link);
        }

        let dest = abs_dir.join(&filename);
        let bytes = self
            .downloader
            .download(url, &dest, self.chunk_size)
            .await?;
        tracing::debug!(file = %dest.display(), bytes, "Downloaded attachment");

        self.index.record(&abs_dir, filename);
        Ok(link)
    }
}

/// Join path parts under `root`, trimming slashes and skipping empty parts.
#[must_use]
pub fn resolve_path(root: &Path, parts: &[&str]) -> PathBuf {
    parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Extension of the URL's last path segment, query string stripped.
#[must_use]
pub fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => FALLBACK_EXTENSION,
    }
}

/// `[name](subdir/filename)` with forward slashes regardless of platform.
fn markdown_link(logical_name: &str, attachment_subdir: &str, filename: &str) -> String {
    let subdir = attachment_subdir.trim_matches('/');
    if subdir.is_empty() {
        format!("[{logical_name}]({filename})")
    } else {
        format!("[{logical_name}]({subdir}/{filename})")
    }
}
