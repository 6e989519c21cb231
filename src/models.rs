//! Herd record types
//!
//! Every record is keyed by a string id. Parent links on [`Goat`] are weak:
//! they may be absent or name a goat the store does not know about.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Goat gestation length used to estimate kidding dates
pub const GESTATION_DAYS: i64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoatStatus {
    #[default]
    Active,
    Sold,
    Deceased,
}

/// Registered goat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goat {
    pub id: String,
    pub name: String,
    pub tag_number: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<String>,
    #[serde(default)]
    pub status: GoatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Goat {
    /// Minimal goat with no parents
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        gender: Gender,
        date_of_birth: NaiveDate,
    ) -> Self {
        let id = id.into();
        Self {
            tag_number: id.clone(),
            id,
            name: name.into(),
            gender,
            date_of_birth,
            father_id: None,
            mother_id: None,
            status: GoatStatus::Active,
            breed: None,
            color: None,
            notes: None,
        }
    }

    pub fn with_tag(mut self, tag_number: impl Into<String>) -> Self {
        self.tag_number = tag_number.into();
        self
    }

    pub fn with_parents(mut self, father_id: Option<&str>, mother_id: Option<&str>) -> Self {
        self.father_id = father_id.map(str::to_string);
        self.mother_id = mother_id.map(str::to_string);
        self
    }

    /// Parent ids that are set, father first
    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.father_id
            .as_deref()
            .into_iter()
            .chain(self.mother_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightRecord {
    pub id: String,
    pub goat_id: String,
    pub date: NaiveDate,
    pub weight_kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRecordType {
    Vaccination,
    Treatment,
    Checkup,
    Deworming,
    Injury,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub id: String,
    pub goat_id: String,
    pub date: NaiveDate,
    pub record_type: HealthRecordType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veterinarian: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreedingRecord {
    pub id: String,
    pub sire_id: String,
    pub dam_id: String,
    pub breeding_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_kidding_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_kidding_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kids_born: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BreedingRecord {
    /// Kidding date estimated from the breeding date
    pub fn estimated_kidding_date(&self) -> NaiveDate {
        self.breeding_date + Duration::days(GESTATION_DAYS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinanceKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceRecord {
    pub id: String,
    pub date: NaiveDate,
    pub kind: FinanceKind,
    pub category: String,
    pub amount: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goat_id: Option<String>,
}
