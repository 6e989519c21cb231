//! Herdbook - goat herd records with pedigree analysis and encrypted backups
//!
//! ## Architecture
//!
//! - **Record store**: typed goat, weight, health, breeding and finance
//!   tables persisted as one JSON document
//! - **Pedigree**: ancestor graphs, parent-assignment checks and inbreeding
//!   estimates over the goat table
//! - **Backups**: password-encrypted archives with retention and optional
//!   automatic scheduling
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/herdbook/
//! ├── herd.json              # Record store
//! ├── backup-settings.json   # Backup preferences
//! ├── backups/               # Default archive directory
//! │   └── goat-backup-20261016T080000000Z.goatbackup
//! └── config.toml            # Optional configuration
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod models;
pub mod pedigree;
pub mod service;
pub mod store;

// Re-exports
pub use backup::{BackupManager, BackupSettings, RestoreReport};
pub use config::Config;
pub use error::{ErrorKind, ErrorPayload, HerdError, Result};
pub use models::{Gender, Goat, GoatStatus};
pub use pedigree::{InbreedingAnalysis, PedigreeTree, ValidationResult};
pub use service::HerdService;
pub use store::{Dataset, Store};
