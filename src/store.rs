//! Record store
//!
//! Flat per-entity tables held in memory and persisted as one JSON document.
//! Every mutation is applied to a copy, written atomically, and only then
//! swapped in, so a failed write never leaves memory and disk out of step.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{HerdError, Result};
use crate::fsutil::write_atomic;
use crate::models::{BreedingRecord, FinanceRecord, Goat, HealthRecord, WeightRecord};

/// Every table of the record store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub goats: Vec<Goat>,
    #[serde(default)]
    pub weight_records: Vec<WeightRecord>,
    #[serde(default)]
    pub health_records: Vec<HealthRecord>,
    #[serde(default)]
    pub breeding_records: Vec<BreedingRecord>,
    #[serde(default)]
    pub finance_records: Vec<FinanceRecord>,
}

impl Dataset {
    pub fn total_records(&self) -> usize {
        self.goats.len()
            + self.weight_records.len()
            + self.health_records.len()
            + self.breeding_records.len()
            + self.finance_records.len()
    }
}

/// A record type stored in its own table
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Table name, as used in the JSON document
    const TABLE: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn table(data: &Dataset) -> &Vec<Self>;
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self>;

    /// Boundary check applied before a record enters the store
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Fill derived fields before insert
    fn normalize(&mut self) {}
}

fn require(field: &str, value: &str, table: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HerdError::Validation(format!("{table}: {field} must not be empty")));
    }
    Ok(())
}

impl Entity for Goat {
    const TABLE: &'static str = "goats";

    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn table(data: &Dataset) -> &Vec<Self> {
        &data.goats
    }
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.goats
    }
    fn check(&self) -> Result<()> {
        require("name", &self.name, Self::TABLE)?;
        require("tagNumber", &self.tag_number, Self::TABLE)
    }
}

impl Entity for WeightRecord {
    const TABLE: &'static str = "weightRecords";

    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn table(data: &Dataset) -> &Vec<Self> {
        &data.weight_records
    }
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.weight_records
    }
    fn check(&self) -> Result<()> {
        require("goatId", &self.goat_id, Self::TABLE)?;
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0) {
            return Err(HerdError::Validation(format!(
                "{}: weight must be positive, got {}",
                Self::TABLE,
                self.weight_kg
            )));
        }
        Ok(())
    }
}

impl Entity for HealthRecord {
    const TABLE: &'static str = "healthRecords";

    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn table(data: &Dataset) -> &Vec<Self> {
        &data.health_records
    }
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.health_records
    }
    fn check(&self) -> Result<()> {
        require("goatId", &self.goat_id, Self::TABLE)
    }
}

impl Entity for BreedingRecord {
    const TABLE: &'static str = "breedingRecords";

    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn table(data: &Dataset) -> &Vec<Self> {
        &data.breeding_records
    }
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.breeding_records
    }
    fn check(&self) -> Result<()> {
        require("sireId", &self.sire_id, Self::TABLE)?;
        require("damId", &self.dam_id, Self::TABLE)
    }
    fn normalize(&mut self) {
        if self.expected_kidding_date.is_none() {
            self.expected_kidding_date = Some(self.estimated_kidding_date());
        }
    }
}

impl Entity for FinanceRecord {
    const TABLE: &'static str = "financeRecords";

    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn table(data: &Dataset) -> &Vec<Self> {
        &data.finance_records
    }
    fn table_mut(data: &mut Dataset) -> &mut Vec<Self> {
        &mut data.finance_records
    }
    fn check(&self) -> Result<()> {
        require("category", &self.category, Self::TABLE)?;
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(HerdError::Validation(format!(
                "{}: amount must be a non-negative number",
                Self::TABLE
            )));
        }
        Ok(())
    }
}

/// File-backed record store
pub struct Store {
    /// JSON document path; `None` keeps everything in memory
    path: Option<PathBuf>,
    data: Dataset,
}

impl Store {
    /// Open (or create) a store backed by `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No record store yet, starting empty");
                Dataset::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            goats = data.goats.len(),
            records = data.total_records(),
            "Opened record store"
        );

        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// Store that never touches disk
    pub fn in_memory(data: Dataset) -> Self {
        Self { path: None, data }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Deep copy of every table
    pub fn snapshot(&self) -> Dataset {
        self.data.clone()
    }

    pub fn goats(&self) -> &[Goat] {
        &self.data.goats
    }

    pub fn goat(&self, id: &str) -> Option<&Goat> {
        self.get::<Goat>(id)
    }

    pub fn all<E: Entity>(&self) -> &[E] {
        E::table(&self.data)
    }

    pub fn get<E: Entity>(&self, id: &str) -> Option<&E> {
        E::table(&self.data).iter().find(|e| e.id() == id)
    }

    /// Insert a record, assigning an id when it has none
    pub fn insert<E: Entity>(&mut self, mut record: E) -> Result<E> {
        if record.id().trim().is_empty() {
            record.set_id(uuid::Uuid::new_v4().to_string());
        }
        record.check()?;
        record.normalize();

        if self.get::<E>(record.id()).is_some() {
            return Err(HerdError::Validation(format!(
                "{}: id {} already exists",
                E::TABLE,
                record.id()
            )));
        }

        let inserted = record.clone();
        self.mutate(|data| {
            E::table_mut(data).push(record);
            Ok(())
        })?;
        Ok(inserted)
    }

    /// Apply `patch` to the record with `id`
    pub fn update<E: Entity>(&mut self, id: &str, patch: impl FnOnce(&mut E)) -> Result<E> {
        let mut updated = None;
        self.mutate(|data| {
            let record = E::table_mut(data)
                .iter_mut()
                .find(|e| e.id() == id)
                .ok_or_else(|| HerdError::RecordNotFound {
                    kind: E::TABLE,
                    id: id.to_string(),
                })?;
            patch(record);
            if record.id() != id {
                return Err(HerdError::Validation(format!(
                    "{}: record id cannot change",
                    E::TABLE
                )));
            }
            record.check()?;
            updated = Some(record.clone());
            Ok(())
        })?;
        updated.ok_or_else(|| HerdError::Internal("update produced no record".to_string()))
    }

    /// Delete a record; goats take their weight and health records with them
    pub fn delete<E: Entity>(&mut self, id: &str) -> Result<()> {
        if self.get::<E>(id).is_none() {
            return Err(HerdError::RecordNotFound {
                kind: E::TABLE,
                id: id.to_string(),
            });
        }

        let cascade = E::TABLE == Goat::TABLE;
        self.mutate(|data| {
            E::table_mut(data).retain(|e| e.id() != id);
            if cascade {
                data.weight_records.retain(|w| w.goat_id != id);
                data.health_records.retain(|h| h.goat_id != id);
            }
            Ok(())
        })?;

        debug!(table = E::TABLE, id = %id, cascade, "Deleted record");
        Ok(())
    }

    /// Replace every table at once
    pub fn replace_all(&mut self, data: Dataset) -> Result<()> {
        self.mutate(move |current| {
            *current = data;
            Ok(())
        })
    }

    fn mutate(&mut self, f: impl FnOnce(&mut Dataset) -> Result<()>) -> Result<()> {
        let mut next = self.data.clone();
        f(&mut next)?;
        self.persist(&next)?;
        self.data = next;
        Ok(())
    }

    fn persist(&self, data: &Dataset) -> Result<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(data)?;
            write_atomic(path, &json)?;
        }
        Ok(())
    }
}
