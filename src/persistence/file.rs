//! Local file storage with atomic replacement and backup rotation

use super::backend::SnapshotBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const BACKUP_PREFIX: &str = "memory-backup-";
const BACKUP_SUFFIX: &str = ".json";

/// A snapshot stored in one local file
#[derive(Debug, Clone)]
pub struct FileBackend {
    name: String,
    path: PathBuf,
}

impl FileBackend {
    /// Create a file backend named `name` writing to `path`
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Target path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotBackend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Option<Bytes>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, data: Bytes) -> Result<()> {
        write_atomic(&self.path, &data).await
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// Unique per write so the async worker and a sync save never share a temp file
fn temp_path(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("tmp.{}.{}", std::process::id(), n))
}

/// Write to a temp file next to `path`, then rename over it.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Blocking counterpart of [`write_atomic`] for the shutdown path.
pub fn write_atomic_sync(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Timestamped backup copies in one directory
#[derive(Debug, Clone)]
pub struct BackupRotation {
    dir: PathBuf,
    retention: usize,
}

impl BackupRotation {
    /// Keep at most `retention` copies in `dir`; 0 disables backups
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    /// Write a new copy and delete the oldest beyond retention.
    ///
    /// Returns the path of the new copy, `None` when disabled.
    pub async fn rotate(&self, data: &[u8]) -> Result<Option<PathBuf>> {
        if self.retention == 0 {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        // Fixed-width UTC stamp so name order is chronological
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let path = self
            .dir
            .join(format!("{}{}{}", BACKUP_PREFIX, stamp, BACKUP_SUFFIX));
        write_atomic(&path, data).await?;

        let backups = self.list().await?;
        let excess = backups.len().saturating_sub(self.retention);
        for old in backups.into_iter().take(excess) {
            if let Err(e) = tokio::fs::remove_file(&old).await {
                tracing::warn!(path = %old.display(), error = %e, "Failed to delete old backup");
            }
        }
        Ok(Some(path))
    }

    /// Existing backups, oldest first
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_backup = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(BACKUP_SUFFIX));
            if is_backup {
                backups.push(path);
            }
        }
        backups.sort();
        Ok(backups)
    }
}
