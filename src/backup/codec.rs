//! Archive encode/decode pipeline and the backup manager
//!
//! Encode: snapshot → JSON → LZ4 → ChaCha20-Poly1305 → envelope.
//! Decode runs the same steps in reverse and fully validates the payload
//! before anything is written to the store.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::crypto::{self, NONCE_LEN, SALT_LEN};
use super::retention::{archive_name, BackupInfo, PruneReport, RetentionManager};
use super::schedule::{Clock, SystemClock};
use super::{BackupCreated, BackupEnvelope, BackupSettings, KdfSettings, SettingsFile, ENVELOPE_VERSION};
use crate::config::KdfConfig;
use crate::error::{HerdError, Result};
use crate::fsutil::write_atomic;
use crate::models::Goat;
use crate::store::{Dataset, Entity, Store};

/// Plaintext inside the envelope
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupPayload<'a> {
    version: &'a str,
    export_date: DateTime<Utc>,
    #[serde(flatten)]
    data: &'a Dataset,
}

/// What a restore (or verify) recovered from an archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
    pub goats: usize,
    pub weight_records: usize,
    pub health_records: usize,
    pub breeding_records: usize,
    pub finance_records: usize,
    /// Records dropped because they were malformed or duplicated
    pub skipped: usize,
}

impl RestoreReport {
    fn count(data: &Dataset, export_date: Option<DateTime<Utc>>, skipped: usize) -> Self {
        Self {
            export_date,
            goats: data.goats.len(),
            weight_records: data.weight_records.len(),
            health_records: data.health_records.len(),
            breeding_records: data.breeding_records.len(),
            finance_records: data.finance_records.len(),
            skipped,
        }
    }
}

// ============================================================================
// Encode / decode
// ============================================================================

/// Seal `data` into serialized envelope bytes.
pub fn encode_archive(
    data: &Dataset,
    password: &[u8],
    kdf: &KdfSettings,
    timestamp: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let payload = BackupPayload {
        version: ENVELOPE_VERSION,
        export_date: timestamp,
        data,
    };
    let json = Zeroizing::new(serde_json::to_vec(&payload)?);
    let compressed = Zeroizing::new(lz4_flex::compress_prepend_size(&json));

    let salt: [u8; SALT_LEN] = crypto::generate_random_bytes();
    let nonce: [u8; NONCE_LEN] = crypto::generate_random_bytes();
    let key = crypto::derive_key(password, &salt, kdf)?;
    let ciphertext = crypto::encrypt(&compressed, &key, &nonce)?;

    let envelope = BackupEnvelope {
        version: ENVELOPE_VERSION.to_string(),
        timestamp,
        salt: hex::encode(salt),
        kdf: kdf.clone(),
        iv: hex::encode(nonce),
        data: BASE64.encode(ciphertext),
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Open envelope bytes and recover the dataset.
///
/// Errors: unknown version → `UnsupportedVersion`; malformed envelope or
/// payload → `InvalidArchive`; wrong password or tampered ciphertext →
/// `Crypto`.
pub fn decode_archive(bytes: &[u8], password: &[u8]) -> Result<(Dataset, RestoreReport)> {
    let raw: Value = serde_json::from_slice(bytes)
        .map_err(|e| HerdError::InvalidArchive(format!("envelope is not JSON: {e}")))?;
    match raw.get("version").and_then(Value::as_str) {
        Some(ENVELOPE_VERSION) => {}
        Some(other) => return Err(HerdError::UnsupportedVersion(other.to_string())),
        None => return Err(HerdError::InvalidArchive("envelope has no version".to_string())),
    }
    let envelope: BackupEnvelope = serde_json::from_value(raw)
        .map_err(|e| HerdError::InvalidArchive(format!("malformed envelope: {e}")))?;

    let salt: [u8; SALT_LEN] = hex::decode(&envelope.salt)
        .ok()
        .and_then(|salt| salt.try_into().ok())
        .ok_or_else(|| HerdError::InvalidArchive("salt must be 16 hex-encoded bytes".to_string()))?;
    let nonce: [u8; NONCE_LEN] = hex::decode(&envelope.iv)
        .ok()
        .and_then(|iv| iv.try_into().ok())
        .ok_or_else(|| HerdError::InvalidArchive("iv must be 12 hex-encoded bytes".to_string()))?;
    let ciphertext = BASE64
        .decode(envelope.data.as_bytes())
        .map_err(|e| HerdError::InvalidArchive(format!("bad payload encoding: {e}")))?;

    let key = crypto::derive_key(password, &salt, &envelope.kdf)?;
    let compressed = crypto::decrypt(&ciphertext, &key, &nonce)?;
    let json = Zeroizing::new(
        lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| HerdError::InvalidArchive(format!("decompression failed: {e}")))?,
    );

    let payload: Value = serde_json::from_slice(&json)
        .map_err(|e| HerdError::InvalidArchive(format!("payload is not JSON: {e}")))?;
    recover_dataset(&payload)
}

fn recover_dataset(payload: &Value) -> Result<(Dataset, RestoreReport)> {
    let Some(object) = payload.as_object() else {
        return Err(HerdError::InvalidArchive("payload is not an object".to_string()));
    };
    if !object.get(Goat::TABLE).is_some_and(Value::is_array) {
        return Err(HerdError::InvalidArchive("payload has no goats array".to_string()));
    }

    let export_date = object
        .get("exportDate")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    let mut skipped = 0;
    let data = Dataset {
        goats: recover_table(payload, &mut skipped),
        weight_records: recover_table(payload, &mut skipped),
        health_records: recover_table(payload, &mut skipped),
        breeding_records: recover_table(payload, &mut skipped),
        finance_records: recover_table(payload, &mut skipped),
    };

    if skipped > 0 {
        warn!(skipped, "Skipped malformed records while reading backup");
    }
    let report = RestoreReport::count(&data, export_date, skipped);
    Ok((data, report))
}

/// Records of one table, dropping any that fail to parse, fail their
/// boundary check, or repeat an earlier id
fn recover_table<E: Entity>(payload: &Value, skipped: &mut usize) -> Vec<E> {
    let items = match payload.get(E::TABLE) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!(table = E::TABLE, "Backup table is not an array, ignoring it");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record: E = match serde_json::from_value(item.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!(table = E::TABLE, index, error = %e, "Skipping malformed record");
                *skipped += 1;
                continue;
            }
        };
        if let Err(e) = record.check() {
            warn!(table = E::TABLE, index, error = %e, "Skipping invalid record");
            *skipped += 1;
            continue;
        }
        if !seen.insert(record.id().to_string()) {
            warn!(table = E::TABLE, id = %record.id(), "Skipping duplicate record");
            *skipped += 1;
            continue;
        }
        records.push(record);
    }
    records
}

// ============================================================================
// Backup manager
// ============================================================================

/// Creates, restores and maintains archives for one record store.
///
/// At most one create or restore runs at a time; a second attempt fails
/// fast with [`HerdError::BackupInProgress`].
pub struct BackupManager {
    store: Arc<RwLock<Store>>,
    settings: SettingsFile,
    kdf: KdfConfig,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl BackupManager {
    pub fn new(store: Arc<RwLock<Store>>, settings: SettingsFile, kdf: KdfConfig) -> Self {
        Self {
            store,
            settings,
            kdf,
            clock: Arc::new(SystemClock),
            lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<RwLock<Store>> {
        &self.store
    }

    /// Current settings, re-read from disk on every call
    pub fn settings(&self) -> Result<BackupSettings> {
        self.settings.load()
    }

    pub fn update_settings(&self, settings: BackupSettings) -> Result<BackupSettings> {
        self.settings.save(&settings)?;
        info!(
            auto_backup = settings.auto_backup,
            schedule = ?settings.schedule,
            keep_versions = settings.keep_versions,
            "Backup settings updated"
        );
        Ok(settings)
    }

    fn retention(&self) -> Result<RetentionManager> {
        Ok(RetentionManager::new(self.settings()?.backup_path))
    }

    /// Write a new archive, then prune the destination to `keepVersions`.
    pub async fn create_backup(&self, password: &str, destination: Option<&Path>) -> Result<BackupCreated> {
        let _guard = self.lock.try_lock().map_err(|_| HerdError::BackupInProgress)?;

        let settings = self.settings()?;
        let dir = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| settings.backup_path.clone());
        let data = self.store.read().await.snapshot();
        let timestamp = self.clock.now();
        let kdf = KdfSettings::from(self.kdf);
        let password = Zeroizing::new(password.as_bytes().to_vec());

        let target = dir.clone();
        let created = tokio::task::spawn_blocking(move || write_archive(&target, &data, &password, &kdf, timestamp))
            .await
            .map_err(|e| HerdError::Internal(format!("backup task failed: {e}")))??;

        info!(
            archive = %created.filename,
            size = created.size,
            "Backup created"
        );

        match RetentionManager::new(dir).prune(settings.keep_versions) {
            Ok(report) if !report.failed.is_empty() => {
                warn!(failed = report.failed.len(), "Some old backups could not be pruned");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Backup pruning failed"),
        }

        Ok(created)
    }

    /// Restore the archive `id` from the configured backup directory.
    pub async fn restore_backup(&self, id: &str, password: &str) -> Result<RestoreReport> {
        let path = self.retention()?.resolve(id)?;
        self.restore_backup_file(&path, password).await
    }

    /// Restore from an archive anywhere on disk. The store is replaced only
    /// after the archive decodes completely.
    pub async fn restore_backup_file(&self, path: &Path, password: &str) -> Result<RestoreReport> {
        let _guard = self.lock.try_lock().map_err(|_| HerdError::BackupInProgress)?;

        let (data, report) = read_archive(path.to_path_buf(), password).await?;
        self.store.write().await.replace_all(data)?;

        info!(
            archive = %path.display(),
            goats = report.goats,
            skipped = report.skipped,
            "Backup restored"
        );
        Ok(report)
    }

    /// Decode an archive without touching the store
    pub async fn verify_backup(&self, id: &str, password: &str) -> Result<RestoreReport> {
        let path = self.retention()?.resolve(id)?;
        let (_, report) = read_archive(path, password).await?;
        debug!(archive = %id, "Backup verified");
        Ok(report)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.retention()?.list()
    }

    pub fn delete_backup(&self, id: &str) -> Result<()> {
        self.retention()?.delete(id)
    }

    /// Prune to `keep` archives, or to `keepVersions` when not given
    pub fn prune(&self, keep: Option<usize>) -> Result<PruneReport> {
        let settings = self.settings()?;
        let keep = keep.unwrap_or(settings.keep_versions);
        RetentionManager::new(settings.backup_path).prune(keep)
    }
}

fn write_archive(
    dir: &Path,
    data: &Dataset,
    password: &[u8],
    kdf: &KdfSettings,
    timestamp: DateTime<Utc>,
) -> Result<BackupCreated> {
    std::fs::create_dir_all(dir)?;

    // Millisecond names can collide on fast successive backups
    let mut timestamp = timestamp;
    let mut filename = archive_name(timestamp);
    while dir.join(&filename).exists() {
        timestamp += chrono::Duration::milliseconds(1);
        filename = archive_name(timestamp);
    }
    let path = dir.join(&filename);

    let bytes = encode_archive(data, password, kdf, timestamp)?;
    write_atomic(&path, &bytes)?;

    Ok(BackupCreated {
        filename,
        size: bytes.len() as u64,
        path,
        timestamp,
    })
}

async fn read_archive(path: PathBuf, password: &str) -> Result<(Dataset, RestoreReport)> {
    let password = Zeroizing::new(password.as_bytes().to_vec());
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => HerdError::BackupNotFound(path.display().to_string()),
            _ => HerdError::Io(e),
        })?;
        decode_archive(&bytes, &password)
    })
    .await
    .map_err(|e| HerdError::Internal(format!("restore task failed: {e}")))?
}
