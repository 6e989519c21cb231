//! Herd service - the operations a UI calls
//!
//! Wraps the shared record store with pedigree analysis, parent assignment
//! and the backup manager.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use zeroize::Zeroizing;

use crate::backup::{
    AutoBackupHandle, AutoBackupScheduler, BackupCreated, BackupInfo, BackupManager, BackupSettings,
    PruneReport, RestoreReport, SettingsFile,
};
use crate::config::Config;
use crate::error::{HerdError, Result};
use crate::models::Goat;
use crate::pedigree::{self, InbreedingAnalysis, PedigreeTree, ValidationResult};
use crate::store::Store;

pub struct HerdService {
    store: Arc<RwLock<Store>>,
    backups: Arc<BackupManager>,
}

impl HerdService {
    /// Open the store and backup settings under `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::open(config.store_path())?;
        Ok(Self::with_store(config, store))
    }

    /// Service over an already opened store
    pub fn with_store(config: &Config, store: Store) -> Self {
        let store = Arc::new(RwLock::new(store));
        let settings = SettingsFile::new(config.settings_path(), config.default_backup_dir());
        let backups = Arc::new(BackupManager::new(store.clone(), settings, config.kdf));
        Self { store, backups }
    }

    pub fn store(&self) -> &Arc<RwLock<Store>> {
        &self.store
    }

    pub fn backups(&self) -> &Arc<BackupManager> {
        &self.backups
    }

    // =========================================================================
    // Pedigree
    // =========================================================================

    /// Ancestor graph of `goat_id`; empty when the goat is unknown
    pub async fn build_pedigree_tree(&self, goat_id: &str, max_generations: usize) -> PedigreeTree {
        let store = self.store.read().await;
        pedigree::build_tree(&*store, goat_id, max_generations)
    }

    pub async fn validate_parentage(
        &self,
        goat_id: &str,
        father_id: Option<&str>,
        mother_id: Option<&str>,
    ) -> ValidationResult {
        let store = self.store.read().await;
        pedigree::validate_parentage(&*store, goat_id, father_id, mother_id)
    }

    /// Validate and then persist a parent assignment.
    ///
    /// Any validation error blocks the write. Warnings are returned alongside
    /// the updated goat.
    pub async fn assign_parents(
        &self,
        goat_id: &str,
        father_id: Option<&str>,
        mother_id: Option<&str>,
    ) -> Result<(Goat, ValidationResult)> {
        let mut store = self.store.write().await;
        if store.goat(goat_id).is_none() {
            return Err(HerdError::GoatNotFound(goat_id.to_string()));
        }

        let validation = pedigree::validate_parentage(&*store, goat_id, father_id, mother_id);
        if !validation.is_valid {
            return Err(HerdError::Validation(validation.error_summary()));
        }

        let goat = store.update::<Goat>(goat_id, |goat| {
            goat.father_id = father_id.map(str::to_string);
            goat.mother_id = mother_id.map(str::to_string);
        })?;
        info!(
            goat = %goat_id,
            father = ?father_id,
            mother = ?mother_id,
            warnings = validation.warnings.len(),
            "Parents assigned"
        );
        Ok((goat, validation))
    }

    pub async fn analyze_inbreeding(&self, sire_id: &str, dam_id: &str) -> InbreedingAnalysis {
        let store = self.store.read().await;
        pedigree::analyze(&*store, sire_id, dam_id)
    }

    // =========================================================================
    // Backups
    // =========================================================================

    pub async fn create_backup(&self, password: &str, destination: Option<&Path>) -> Result<BackupCreated> {
        self.backups.create_backup(password, destination).await
    }

    pub async fn restore_backup(&self, archive_id: &str, password: &str) -> Result<RestoreReport> {
        self.backups.restore_backup(archive_id, password).await
    }

    pub async fn restore_backup_file(&self, path: &Path, password: &str) -> Result<RestoreReport> {
        self.backups.restore_backup_file(path, password).await
    }

    pub async fn verify_backup(&self, archive_id: &str, password: &str) -> Result<RestoreReport> {
        self.backups.verify_backup(archive_id, password).await
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.backups.list_backups()
    }

    pub fn delete_backup(&self, archive_id: &str) -> Result<()> {
        self.backups.delete_backup(archive_id)
    }

    pub fn prune_backups(&self, keep: Option<usize>) -> Result<PruneReport> {
        self.backups.prune(keep)
    }

    pub fn backup_settings(&self) -> Result<BackupSettings> {
        self.backups.settings()
    }

    pub fn update_backup_settings(&self, settings: BackupSettings) -> Result<BackupSettings> {
        self.backups.update_settings(settings)
    }

    /// Start the automatic backup task with the system clock and timer
    pub fn start_auto_backup(&self, password: Zeroizing<String>) -> AutoBackupHandle {
        AutoBackupScheduler::new(self.backups.clone()).start(password)
    }
}
