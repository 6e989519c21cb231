//! Pedigree analysis
//!
//! Pure, synchronous functions over goats already loaded in memory:
//!
//! - [`tree`] builds a layout-annotated ancestor graph for display
//! - [`validate`] checks a proposed parent assignment
//! - [`inbreeding`] estimates relatedness of a candidate pairing
//!
//! Parent pointers come from user data and imports, so nothing here assumes
//! the graph is acyclic. Every walk keeps a visited set and stops at
//! [`MAX_GENERATIONS`].

pub mod inbreeding;
pub mod tree;
pub mod validate;

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

use crate::models::Goat;
use crate::store::Store;

pub use inbreeding::{analyze, AncestorContribution, InbreedingAnalysis, RiskLevel};
pub use tree::{build_tree, layout_position, NodeKind, ParentRole, PedigreeEdge, PedigreeNode, PedigreeTree, Position};
pub use validate::{validate_parentage, IssueCode, ParentageIssue, ValidationResult};

/// Hard cap on ancestry depth for every traversal
pub const MAX_GENERATIONS: usize = 50;

/// Read-only goat lookup used by the pedigree functions
pub trait GoatLookup {
    fn find_goat(&self, id: &str) -> Option<&Goat>;
}

impl GoatLookup for Store {
    fn find_goat(&self, id: &str) -> Option<&Goat> {
        self.goat(id)
    }
}

impl GoatLookup for HashMap<String, Goat> {
    fn find_goat(&self, id: &str) -> Option<&Goat> {
        self.get(id)
    }
}

/// Id index over a goat table
pub struct Herd<'a> {
    goats: HashMap<&'a str, &'a Goat>,
}

impl<'a> Herd<'a> {
    pub fn new(goats: &'a [Goat]) -> Self {
        Self {
            goats: goats.iter().map(|g| (g.id.as_str(), g)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.goats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goats.is_empty()
    }
}

impl GoatLookup for Herd<'_> {
    fn find_goat(&self, id: &str) -> Option<&Goat> {
        self.goats.get(id).copied()
    }
}

/// Shortest generation distance from `start_id` to each of its ancestors.
///
/// Parents are distance 1. Parent ids that do not resolve are still reported
/// (they are real references) but cannot be expanded further. `start_id`
/// itself is never included, even when malformed data makes it its own
/// ancestor.
pub fn ancestor_distances<L: GoatLookup + ?Sized>(lookup: &L, start_id: &str) -> HashMap<String, usize> {
    let mut distances = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    visited.insert(start_id);
    queue.push_back((start_id, 0));

    while let Some((id, depth)) = queue.pop_front() {
        let Some(goat) = lookup.find_goat(id) else {
            continue;
        };
        if depth >= MAX_GENERATIONS {
            warn!(goat = %start_id, cap = MAX_GENERATIONS, "Ancestry walk hit generation cap");
            continue;
        }

        for parent_id in goat.parent_ids() {
            if visited.insert(parent_id) {
                distances.insert(parent_id.to_string(), depth + 1);
                queue.push_back((parent_id, depth + 1));
            }
        }
    }

    distances
}

/// Whether `ancestor_id` appears anywhere in the ancestry of `goat_id`
pub fn is_ancestor<L: GoatLookup + ?Sized>(lookup: &L, ancestor_id: &str, goat_id: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    visited.insert(goat_id);
    queue.push_back((goat_id, 0));

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= MAX_GENERATIONS {
            continue;
        }
        let Some(goat) = lookup.find_goat(id) else {
            continue;
        };
        for parent_id in goat.parent_ids() {
            if parent_id == ancestor_id {
                return true;
            }
            if visited.insert(parent_id) {
                queue.push_back((parent_id, depth + 1));
            }
        }
    }

    false
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::Gender;
    use chrono::NaiveDate;

    /// Goat born in `year` with optional parents; gender from the id prefix
    /// (`s`/`m` male, anything else female)
    pub fn goat(id: &str, year: i32, father: Option<&str>, mother: Option<&str>) -> Goat {
        let gender = if id.starts_with('s') || id.starts_with('m') {
            Gender::Male
        } else {
            Gender::Female
        };
        Goat::new(id, id.to_uppercase(), gender, NaiveDate::from_ymd_opt(year, 1, 1).unwrap())
            .with_parents(father, mother)
    }

    pub fn herd(goats: Vec<Goat>) -> HashMap<String, Goat> {
        goats.into_iter().map(|g| (g.id.clone(), g)).collect()
    }
}
