//! Pedigree integration tests
//!
//! Runs the pedigree functions against a real record store:
//! - Parent assignment validation
//! - Ancestor graph depth and shared-ancestor handling
//! - Inbreeding estimates for common relationships

use chrono::NaiveDate;
use tempfile::TempDir;

use herdbook::models::{Gender, Goat, HealthRecord, HealthRecordType, WeightRecord};
use herdbook::pedigree::{self, Herd, IssueCode, NodeKind, RiskLevel};
use herdbook::store::{Dataset, Store};

fn goat(id: &str, gender: Gender, year: i32, father: Option<&str>, mother: Option<&str>) -> Goat {
    Goat::new(id, format!("Goat {id}"), gender, NaiveDate::from_ymd_opt(year, 5, 1).unwrap())
        .with_parents(father, mother)
}

fn store(goats: Vec<Goat>) -> Store {
    Store::in_memory(Dataset {
        goats,
        ..Default::default()
    })
}

// =============================================================================
// Relationship validation
// =============================================================================

#[test]
fn test_goat_cannot_be_its_own_parent() {
    let s = store(vec![goat("g", Gender::Male, 2022, None, None)]);

    let father = pedigree::validate_parentage(&s, "g", Some("g"), None);
    let mother = pedigree::validate_parentage(&s, "g", None, Some("g"));

    assert!(!father.is_valid);
    assert!(!mother.is_valid);
    assert!(father.has_error(IssueCode::SelfParent));
}

#[test]
fn test_three_generation_cycle_rejected() {
    let s = store(vec![
        goat("grandsire", Gender::Male, 2018, None, None),
        goat("sire", Gender::Male, 2020, Some("grandsire"), None),
        goat("kid", Gender::Male, 2023, Some("sire"), None),
    ]);

    let result = pedigree::validate_parentage(&s, "grandsire", Some("kid"), None);
    assert!(!result.is_valid);
    assert!(result.has_error(IssueCode::CircularRelationship));
}

// =============================================================================
// Pedigree graph
// =============================================================================

fn deep_herd() -> Store {
    store(vec![
        goat("kid", Gender::Female, 2024, Some("s1"), Some("d1")),
        goat("s1", Gender::Male, 2021, Some("s2"), Some("d2")),
        goat("d1", Gender::Female, 2021, Some("s3"), Some("d3")),
        goat("s2", Gender::Male, 2018, Some("s4"), Some("d4")),
        goat("d2", Gender::Female, 2018, None, None),
        goat("s3", Gender::Male, 2018, None, None),
        goat("d3", Gender::Female, 2018, None, None),
        goat("s4", Gender::Male, 2015, None, None),
        goat("d4", Gender::Female, 2015, None, None),
    ])
}

#[test]
fn test_tree_respects_generation_limit() {
    let s = deep_herd();

    let tree = pedigree::build_tree(&s, "kid", 2);
    assert!(tree.nodes.iter().all(|n| n.generation <= 2));
    assert!(tree.node("s4").is_none());

    let full = pedigree::build_tree(&s, "kid", 10);
    assert_eq!(full.nodes.len(), 9);
    assert_eq!(full.deepest_generation(), 3);
}

#[test]
fn test_double_cousin_shared_grandfather_appears_once() {
    // Both parents share the same sire
    let s = store(vec![
        goat("kid", Gender::Female, 2024, Some("s1"), Some("d1")),
        goat("s1", Gender::Male, 2021, Some("old_buck"), Some("da")),
        goat("d1", Gender::Female, 2021, Some("old_buck"), Some("db")),
        goat("old_buck", Gender::Male, 2016, None, None),
        goat("da", Gender::Female, 2017, None, None),
        goat("db", Gender::Female, 2017, None, None),
    ]);

    let tree = pedigree::build_tree(&s, "kid", 4);
    let count = tree.nodes.iter().filter(|n| n.id == "old_buck").count();
    assert_eq!(count, 1);
    assert_eq!(tree.edges_from("old_buck").count(), 2);
}

#[test]
fn test_tree_over_herd_index_matches_store() {
    let s = deep_herd();
    let herd = Herd::new(s.goats());
    assert_eq!(herd.len(), 9);

    let from_store = pedigree::build_tree(&s, "kid", 3);
    let from_index = pedigree::build_tree(&herd, "kid", 3);
    let ids = |t: &pedigree::PedigreeTree| t.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&from_store), ids(&from_index));
}

#[test]
fn test_unresolved_parent_is_placeholder() {
    let s = store(vec![goat("kid", Gender::Male, 2024, Some("bought-in"), None)]);
    let tree = pedigree::build_tree(&s, "kid", 3);
    assert_eq!(tree.node("bought-in").map(|n| n.kind), Some(NodeKind::Unknown));
}

// =============================================================================
// Inbreeding
// =============================================================================

#[test]
fn test_inbreeding_is_symmetric() {
    let s = store(vec![
        goat("buck", Gender::Male, 2023, Some("s1"), Some("d1")),
        goat("doe", Gender::Female, 2023, Some("s1"), Some("d2")),
        goat("s1", Gender::Male, 2019, Some("gs"), None),
        goat("d1", Gender::Female, 2019, Some("gs"), None),
        goat("d2", Gender::Female, 2019, None, None),
        goat("gs", Gender::Male, 2015, None, None),
    ]);

    let forward = pedigree::analyze(&s, "buck", "doe");
    let backward = pedigree::analyze(&s, "doe", "buck");
    assert_eq!(forward.coefficient, backward.coefficient);
    assert!(forward.coefficient > 0.125);
}

#[test]
fn test_full_siblings_high_risk() {
    let s = store(vec![
        goat("brother", Gender::Male, 2023, Some("s1"), Some("d1")),
        goat("sister", Gender::Female, 2023, Some("s1"), Some("d1")),
        goat("s1", Gender::Male, 2019, None, None),
        goat("d1", Gender::Female, 2019, None, None),
    ]);

    let analysis = pedigree::analyze(&s, "brother", "sister");
    assert!((analysis.coefficient - 0.25).abs() < 1e-9);
    assert!(analysis.risk >= RiskLevel::High);
}

#[test]
fn test_sire_over_daughter_flagged_but_not_scored() {
    let s = store(vec![
        goat("s1", Gender::Male, 2019, None, None),
        goat("d1", Gender::Female, 2019, None, None),
        goat("daughter", Gender::Female, 2022, Some("s1"), Some("d1")),
    ]);

    let analysis = pedigree::analyze(&s, "s1", "daughter");
    assert_eq!(analysis.coefficient, 0.0);
    assert_eq!(analysis.risk, RiskLevel::Low);
    assert!(analysis.common_ancestors.is_empty());
    assert!(analysis.direct_line);
}

#[test]
fn test_unrelated_deep_pedigrees_low_risk() {
    let s = store(vec![
        goat("a", Gender::Male, 2024, Some("a_s"), Some("a_d")),
        goat("a_s", Gender::Male, 2021, Some("a_gs"), Some("a_gd")),
        goat("a_gs", Gender::Male, 2018, Some("a_ggs"), None),
        goat("b", Gender::Female, 2024, Some("b_s"), Some("b_d")),
        goat("b_s", Gender::Male, 2021, Some("b_gs"), Some("b_gd")),
        goat("b_gs", Gender::Male, 2018, Some("b_ggs"), None),
    ]);

    let analysis = pedigree::analyze(&s, "a", "b");
    assert_eq!(analysis.coefficient, 0.0);
    assert_eq!(analysis.risk, RiskLevel::Low);
}

// =============================================================================
// Store
// =============================================================================

#[test]
fn test_goat_delete_cascades_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("herd.json");
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    let mut s = Store::open(&path).unwrap();
    s.insert(goat("g1", Gender::Female, 2022, None, None)).unwrap();
    s.insert(WeightRecord {
        id: "w1".into(),
        goat_id: "g1".into(),
        date,
        weight_kg: 40.0,
        notes: None,
    })
    .unwrap();
    s.insert(HealthRecord {
        id: "h1".into(),
        goat_id: "g1".into(),
        date,
        record_type: HealthRecordType::Vaccination,
        description: "CDT booster".into(),
        veterinarian: None,
        cost: None,
        next_due_date: None,
    })
    .unwrap();

    s.delete::<Goat>("g1").unwrap();

    let reopened = Store::open(&path).unwrap();
    assert!(reopened.goats().is_empty());
    assert!(reopened.data().weight_records.is_empty());
    assert!(reopened.data().health_records.is_empty());
}
