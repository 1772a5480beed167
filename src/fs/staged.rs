//! Streaming staging file with atomic publish.
//!
//! Large snapshots are written incrementally to `<file>.tmp` and only renamed
//! over `<file>` once the stream has been flushed and synced. Until then the
//! previously published file is untouched.

use super::atomic::{self, staging_path};
use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// A file being written beside its final destination.
///
/// Dropping a `StagedFile` that was neither published nor discarded removes
/// the staging file, so a cancelled or panicking writer leaves nothing behind.
#[derive(Debug)]
pub struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl StagedFile {
    /// Create (or truncate) the staging file for `target`.
    pub async fn create<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let staging = staging_path(&target)?;

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::Persistence(format!(
                    "failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(&staging).await.map_err(|e| {
            SyncError::Persistence(format!(
                "failed to create staging file '{}': {}",
                staging.display(),
                e
            ))
        })?;

        Ok(Self {
            staging,
            target,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    /// Path of the staging file.
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Path the file will be published to.
    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append bytes to the staging file.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            SyncError::Persistence(format!(
                "staging file '{}' is already closed",
                self.staging.display()
            ))
        })?;

        writer.write_all(bytes).await.map_err(|e| {
            SyncError::Persistence(format!(
                "failed to write staging file '{}': {}",
                self.staging.display(),
                e
            ))
        })?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Flush, fsync, and atomically rename the staging file over the target.
    ///
    /// Returns the number of bytes published. On failure the staging file is
    /// removed and the target keeps its previous content.
    pub async fn publish(mut self) -> Result<u64> {
        let Some(mut writer) = self.writer.take() else {
            return Err(SyncError::Persistence(format!(
                "staging file '{}' is already closed",
                self.staging.display()
            )));
        };

        let flushed = async {
            writer.flush().await?;
            writer.get_mut().sync_all().await
        }
        .await;
        drop(writer);

        if let Err(e) = flushed {
            let _ = fs::remove_file(&self.staging).await;
            return Err(SyncError::Persistence(format!(
                "failed to flush staging file '{}': {}",
                self.staging.display(),
                e
            )));
        }

        let staging = self.staging.clone();
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || atomic::replace(&staging, &target))
            .await
            .map_err(|e| SyncError::Persistence(format!("publish task failed: {}", e)))??;

        Ok(self.bytes_written)
    }

    /// Close and delete the staging file, leaving the target untouched.
    pub async fn discard(mut self) {
        drop(self.writer.take());
        if let Err(e) = fs::remove_file(&self.staging).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.staging.display(),
                error = %e,
                "failed to remove staging file"
            );
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = std::fs::remove_file(&self.staging);
        }
    }
}
