//! Atomic filesystem operations for snapsync.
//!
//! Every file other processes may read (published snapshots, lock records,
//! completion markers) is replaced in one step so a reader opens either the
//! previous complete file or the new complete file.
//!
//! # Implementation Strategy
//!
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target and sync the parent directory
//!
//! `rename()` is atomic when source and destination share a filesystem, which
//! holds because the temporary file always lives beside the target. On Windows
//! `std::fs::rename` replaces an existing destination as well.

use crate::error::{Result, SyncError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file.
///
/// The temporary name carries a random suffix so concurrent writers of the
/// same target (a lock heartbeat and a reclaiming contender, say) never share
/// a staging file.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            SyncError::Persistence(format!(
                "failed to create parent directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = unique_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    replace(&temp_path, path)
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// The fixed staging path for a published snapshot: `<file>.tmp`.
///
/// Only the lock holder writes it, so a fixed name is enough; a leftover from
/// a crashed holder is truncated by the next writer.
pub fn staging_path<P: AsRef<Path>>(target: P) -> Result<PathBuf> {
    let target = target.as_ref();
    let filename = file_name(target)?;
    Ok(parent_of(target).join(format!("{}.tmp", filename)))
}

/// Rename `source` over `target`, then sync the parent directory.
///
/// On failure the source is removed so no orphaned staging file remains.
pub fn replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        SyncError::Persistence(format!(
            "failed to atomically replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    sync_parent_dir(target);
    Ok(())
}

/// Persist the directory entry of a freshly renamed file.
#[cfg(unix)]
fn sync_parent_dir(target: &Path) {
    if let Ok(dir) = File::open(parent_of(target)) {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) {}

fn unique_temp_path(target: &Path) -> Result<PathBuf> {
    let filename = file_name(target)?;
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(parent_of(target).join(format!(".{}.{}.tmp", filename, &suffix[..8])))
}

fn file_name(target: &Path) -> Result<&str> {
    target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SyncError::Persistence(format!("invalid file path '{}'", target.display()))
        })
}

fn parent_of(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        SyncError::Persistence(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        SyncError::Persistence(format!("failed to write to temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        SyncError::Persistence(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("record.json");

        atomic_write(&file_path, b"{\"key\":\"releases\"}").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "{\"key\":\"releases\"}");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("record.json");
        fs::write(&file_path, "original content").unwrap();

        atomic_write_file(&file_path, "new content").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("releases").join("locks").join("a.lock");

        atomic_write(&file_path, b"nested").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("record.json");

        atomic_write(&file_path, b"content").unwrap();
        atomic_write(&file_path, b"content again").unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["record.json".to_string()]);
    }

    #[test]
    fn test_staging_path_sits_beside_target() {
        let staging = staging_path(Path::new("/data/releases/releases.json")).unwrap();
        assert_eq!(staging, PathBuf::from("/data/releases/releases.json.tmp"));
    }

    #[test]
    fn test_staging_path_of_bare_filename() {
        let staging = staging_path(Path::new("releases.json")).unwrap();
        assert_eq!(staging, PathBuf::from("./releases.json.tmp"));
    }

    #[test]
    fn test_replace_moves_source_over_target() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.json.tmp");
        let target = temp_dir.path().join("a.json");
        fs::write(&source, "fresh").unwrap();
        fs::write(&target, "stale").unwrap();

        replace(&source, &target).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "fresh");
    }

    #[test]
    fn test_replace_missing_source_keeps_target() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("missing.tmp");
        let target = temp_dir.path().join("a.json");
        fs::write(&target, "previous").unwrap();

        let err = replace(&source, &target).unwrap_err();

        assert!(matches!(err, SyncError::Persistence(_)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
    }

    #[test]
    fn test_atomic_write_concurrent_same_target() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shared.json");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || atomic_write_file(&path, &format!("writer {}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // Whole content from exactly one writer.
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("writer "));
        assert!(content["writer ".len()..].parse::<u32>().is_ok());
    }
}
