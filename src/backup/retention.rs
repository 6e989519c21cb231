//! Archive housekeeping
//!
//! Archives are recognised purely by file name: `goat-backup-<timestamp>.goatbackup`
//! where the timestamp sorts lexically. Anything else in the backup directory
//! is left alone.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ARCHIVE_EXTENSION, ARCHIVE_PREFIX, ARCHIVE_TIMESTAMP_FORMAT};
use crate::error::{HerdError, Result};

/// One archive on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    /// File name, also the archive id
    pub id: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub kept: usize,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// File name for an archive taken at `timestamp`
pub fn archive_name(timestamp: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        ARCHIVE_PREFIX,
        timestamp.format(ARCHIVE_TIMESTAMP_FORMAT),
        ARCHIVE_EXTENSION
    )
}

/// Timestamp embedded in an archive file name, `None` for anything else
pub fn parse_archive_name(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(ARCHIVE_EXTENSION)?
        .strip_suffix('.')?;
    NaiveDateTime::parse_from_str(stamp, ARCHIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Lists, prunes and deletes archives in one directory
#[derive(Debug, Clone)]
pub struct RetentionManager {
    dir: PathBuf,
}

impl RetentionManager {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archives in the directory, newest first. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<BackupInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(timestamp) = parse_archive_name(&name) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                debug!(name = %name, "Skipping non-file entry with archive name");
                continue;
            }
            archives.push(BackupInfo {
                id: name,
                path: entry.path(),
                timestamp,
                size: metadata.len(),
            });
        }

        archives.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(archives)
    }

    /// Path of an existing archive, rejecting ids that are not archive names
    pub fn resolve(&self, id: &str) -> Result<PathBuf> {
        if id.contains(['/', '\\']) || parse_archive_name(id).is_none() {
            return Err(HerdError::Validation(format!("not a backup archive name: {id}")));
        }
        let path = self.dir.join(id);
        if !path.is_file() {
            return Err(HerdError::BackupNotFound(id.to_string()));
        }
        Ok(path)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.resolve(id)?;
        fs::remove_file(&path)?;
        info!(archive = %id, "Deleted backup");
        Ok(())
    }

    /// Delete all but the newest `keep` archives.
    ///
    /// Individual delete failures are logged and reported, never returned.
    pub fn prune(&self, keep: usize) -> Result<PruneReport> {
        if keep == 0 {
            return Err(HerdError::Validation("keepVersions must be at least 1".to_string()));
        }
        let archives = self.list()?;
        Ok(prune_listed(archives, keep))
    }
}

/// Prune an already sorted (newest first) archive list
pub(crate) fn prune_listed(archives: Vec<BackupInfo>, keep: usize) -> PruneReport {
    let mut report = PruneReport {
        kept: archives.len().min(keep),
        ..Default::default()
    };
    if archives.len() <= keep {
        return report;
    }

    info!(total = archives.len(), keep, "Pruning old backups");
    for old in archives.into_iter().skip(keep) {
        match fs::remove_file(&old.path) {
            Ok(()) => {
                debug!(archive = %old.id, "Removed old backup");
                report.removed.push(old.id);
            }
            Err(e) => {
                warn!(archive = %old.id, error = %e, "Failed to remove old backup");
                report.failed.push(old.id);
            }
        }
    }
    report
}
