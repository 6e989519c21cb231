//! Encrypted backups
//!
//! A backup is one `.goatbackup` file: a small JSON envelope around the whole
//! record store, serialized, LZ4-compressed and sealed with ChaCha20-Poly1305
//! under an Argon2id key derived from the user's password.
//!
//! ```text
//! <backup dir>/
//! ├── goat-backup-20261016T080000000Z.goatbackup
//! ├── goat-backup-20261015T080000000Z.goatbackup
//! └── ...                  # older archives pruned to `keepVersions`
//! ```
//!
//! ## Modules
//!
//! - [`crypto`] - key derivation and authenticated encryption
//! - [`codec`] - archive encode/decode and the [`BackupManager`]
//! - [`retention`] - listing, pruning and deleting archives
//! - [`schedule`] - clock/timer capabilities and automatic backups

pub mod codec;
pub mod crypto;
pub mod retention;
pub mod schedule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::KdfConfig;
use crate::error::{HerdError, Result};
use crate::fsutil::write_atomic;

pub use codec::{BackupManager, RestoreReport};
pub use retention::{BackupInfo, PruneReport, RetentionManager};
pub use schedule::{AutoBackupHandle, AutoBackupScheduler, Clock, SchedulerState, SystemClock, Timer, TokioTimer};

/// Envelope format version written by this build
pub const ENVELOPE_VERSION: &str = "1";

/// Archive file name prefix
pub const ARCHIVE_PREFIX: &str = "goat-backup-";

/// Archive file extension
pub const ARCHIVE_EXTENSION: &str = "goatbackup";

/// Timestamp layout embedded in archive file names (sorts lexically)
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

/// Key derivation algorithm recorded in each envelope
pub const KDF_ALGORITHM: &str = "argon2id";

/// On-disk archive envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Hex-encoded key derivation salt, fresh per archive
    pub salt: String,
    pub kdf: KdfSettings,
    /// Hex-encoded 96-bit nonce, fresh per archive
    pub iv: String,
    /// Base64 ciphertext (with Poly1305 tag)
    pub data: String,
}

/// Key derivation settings stored in the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfSettings {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl From<KdfConfig> for KdfSettings {
    fn from(config: KdfConfig) -> Self {
        Self {
            algorithm: KDF_ALGORITHM.to_string(),
            memory_kib: config.memory_kib,
            iterations: config.iterations,
            parallelism: config.parallelism,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupSchedule {
    Daily,
    #[default]
    Weekly,
    Manual,
}

/// User-facing backup preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    pub auto_backup: bool,
    pub schedule: BackupSchedule,
    pub keep_versions: usize,
    pub backup_path: PathBuf,
}

pub const DEFAULT_KEEP_VERSIONS: usize = 5;

impl BackupSettings {
    pub fn with_backup_path(backup_path: PathBuf) -> Self {
        Self {
            auto_backup: false,
            schedule: BackupSchedule::default(),
            keep_versions: DEFAULT_KEEP_VERSIONS,
            backup_path,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.keep_versions < 1 {
            return Err(HerdError::Config("keepVersions must be at least 1".to_string()));
        }
        if self.backup_path.as_os_str().is_empty() {
            return Err(HerdError::Config("backupPath must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Result of a successful backup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCreated {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

/// Backup settings persisted as JSON, created with defaults on first access
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
    default_backup_dir: PathBuf,
}

impl SettingsFile {
    pub fn new(path: PathBuf, default_backup_dir: PathBuf) -> Self {
        Self {
            path,
            default_backup_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read settings, writing defaults if the file does not exist yet
    pub fn load(&self) -> Result<BackupSettings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let settings: BackupSettings = serde_json::from_str(&content)?;
                settings.validate()?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = BackupSettings::with_backup_path(self.default_backup_dir.clone());
                info!(path = %self.path.display(), "Creating default backup settings");
                if let Err(e) = self.save(&settings) {
                    warn!(error = %e, "Could not persist default backup settings");
                }
                Ok(settings)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, settings: &BackupSettings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_vec_pretty(settings)?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }
}
