//! Temp-directory sweep: deletes files whose modification time is older than
//! the retention window. Non-recursive; subdirectories are skipped.

use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupSummary {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
    pub bytes_freed: u64,
    pub elapsed_ms: u64,
}

/// Sweeps `dir`, removing regular files older than `retention`.
///
/// A missing directory is created and treated as nothing to clean. A failure
/// on one file is logged and tallied but does not stop the sweep.
pub async fn clean_temp_dir(dir: &Path, retention: Duration) -> anyhow::Result<CleanupSummary> {
    let clock = std::time::Instant::now();
    let mut summary = CleanupSummary::default();

    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
        info!(dir = %dir.display(), "temp directory was missing, created it; nothing to clean");
        return Ok(summary);
    }

    let now = SystemTime::now();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "could not stat entry");
                summary.failed += 1;
                continue;
            }
        };

        if !metadata.is_file() {
            debug!(entry = %path.display(), "skipping non-file entry");
            continue;
        }
        summary.scanned += 1;

        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .unwrap_or(Duration::ZERO);

        if age <= retention {
            debug!(file = %path.display(), age_secs = age.as_secs(), "kept");
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                summary.removed += 1;
                summary.bytes_freed += metadata.len();
                info!(
                    file = %path.display(),
                    age_secs = age.as_secs(),
                    size_bytes = metadata.len(),
                    "removed"
                );
            }
            Err(e) => {
                summary.failed += 1;
                warn!(file = %path.display(), error = %e, "failed to remove");
            }
        }
    }

    summary.elapsed_ms = clock.elapsed().as_millis() as u64;
    info!(
        dir = %dir.display(),
        scanned = summary.scanned,
        removed = summary.removed,
        failed = summary.failed,
        bytes_freed = summary.bytes_freed,
        elapsed_ms = summary.elapsed_ms,
        "temp cleanup finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::Write;

    const DAY: u64 = 24 * 60 * 60;

    fn write_aged_file(dir: &Path, name: &str, contents: &[u8], age_days: u64) -> u64 {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        drop(file);

        let mtime = SystemTime::now() - Duration::from_secs(age_days * DAY);
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();
        contents.len() as u64
    }

    #[tokio::test]
    async fn removes_only_files_past_retention() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();

        write_aged_file(dir, "fresh.pdf", b"a", 1);
        write_aged_file(dir, "recent.pdf", b"bb", 5);
        let old = write_aged_file(dir, "old.pdf", b"ccccc", 8);
        let older = write_aged_file(dir, "older.pdf", b"ddddddddd", 15);
        std::fs::create_dir(dir.join("nested")).unwrap();

        let summary = clean_temp_dir(dir, Duration::from_secs(7 * DAY)).await.unwrap();

        assert_eq!(summary.scanned, 4);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.bytes_freed, old + older);

        assert!(dir.join("fresh.pdf").exists());
        assert!(dir.join("recent.pdf").exists());
        assert!(!dir.join("old.pdf").exists());
        assert!(!dir.join("older.pdf").exists());
        // Directories are skipped, not recursed into.
        assert!(dir.join("nested").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_created_and_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("does-not-exist-yet");

        let summary = clean_temp_dir(&dir, Duration::from_secs(DAY)).await.unwrap();
        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.removed, 0);
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = clean_temp_dir(tmp.path(), Duration::from_secs(DAY)).await.unwrap();
        assert_eq!(summary.scanned, 0);
        assert_eq!(summary.bytes_freed, 0);
    }
}
