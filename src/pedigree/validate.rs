//! Parent assignment checks
//!
//! Errors block the assignment; warnings are shown but do not. Nothing here
//! writes to the store.

use serde::Serialize;

use super::{is_ancestor, GoatLookup};
use crate::models::{Gender, Goat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    SelfParent,
    DuplicateParent,
    CircularRelationship,
    ParentNotOlder,
    ParentNotFound,
    ParentGenderMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentageIssue {
    pub code: IssueCode,
    pub message: String,
}

impl ParentageIssue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ParentageIssue>,
    pub warnings: Vec<ParentageIssue>,
}

impl ValidationResult {
    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Error messages joined for display
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate assigning `father_id` / `mother_id` to `goat_id`.
///
/// `goat_id` need not exist yet (a goat being registered); the date check is
/// skipped in that case.
pub fn validate_parentage<L: GoatLookup + ?Sized>(
    lookup: &L,
    goat_id: &str,
    father_id: Option<&str>,
    mother_id: Option<&str>,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let goat = lookup.find_goat(goat_id);

    if father_id == Some(goat_id) {
        errors.push(ParentageIssue::new(
            IssueCode::SelfParent,
            "A goat cannot be its own father",
        ));
    }
    if mother_id == Some(goat_id) {
        errors.push(ParentageIssue::new(
            IssueCode::SelfParent,
            "A goat cannot be its own mother",
        ));
    }
    if let (Some(father), Some(mother)) = (father_id, mother_id) {
        if father == mother {
            errors.push(ParentageIssue::new(
                IssueCode::DuplicateParent,
                "Father and mother must be different goats",
            ));
        }
    }

    for (label, parent_id, expected) in [
        ("father", father_id, Gender::Male),
        ("mother", mother_id, Gender::Female),
    ] {
        let Some(parent_id) = parent_id else {
            continue;
        };
        if parent_id == goat_id {
            continue;
        }

        if is_ancestor(lookup, goat_id, parent_id) {
            errors.push(ParentageIssue::new(
                IssueCode::CircularRelationship,
                format!("Selected {label} {parent_id} is a descendant of {goat_id}"),
            ));
        }

        let Some(parent) = lookup.find_goat(parent_id) else {
            warnings.push(ParentageIssue::new(
                IssueCode::ParentNotFound,
                format!("Selected {label} {parent_id} is not in the herd records"),
            ));
            continue;
        };

        if parent.gender != expected {
            warnings.push(ParentageIssue::new(
                IssueCode::ParentGenderMismatch,
                format!("Selected {label} {} is recorded as {}", parent.name, gender_label(parent)),
            ));
        }

        if let Some(goat) = goat {
            if parent.date_of_birth >= goat.date_of_birth {
                warnings.push(ParentageIssue::new(
                    IssueCode::ParentNotOlder,
                    format!(
                        "Selected {label} {} (born {}) is not older than {} (born {})",
                        parent.name, parent.date_of_birth, goat.name, goat.date_of_birth
                    ),
                ));
            }
        }
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn gender_label(goat: &Goat) -> &'static str {
    match goat.gender {
        Gender::Male => "male",
        Gender::Female => "female",
    }
}
