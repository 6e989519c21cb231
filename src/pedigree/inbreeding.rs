//! Inbreeding estimate for a candidate pairing
//!
//! For every ancestor shared by sire and dam the shortest distance from each
//! side is found, and `0.5^(sire_distance + dam_distance + 1)` is added to the
//! coefficient. Only one (shortest) path per ancestor is counted, so pedigrees
//! with several independent paths to the same ancestor are under-estimated.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{ancestor_distances, GoatLookup};

/// Coefficient thresholds between risk tiers
pub const MODERATE_THRESHOLD: f64 = 0.0625;
pub const HIGH_THRESHOLD: f64 = 0.125;
pub const EXTREME_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn from_coefficient(coefficient: f64) -> Self {
        if coefficient < MODERATE_THRESHOLD {
            RiskLevel::Low
        } else if coefficient < HIGH_THRESHOLD {
            RiskLevel::Moderate
        } else if coefficient < EXTREME_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn recommendations(self) -> Vec<String> {
        let lines: &[&str] = match self {
            RiskLevel::Low => &[
                "Pairing is acceptable from an inbreeding standpoint.",
                "Keep recording parentage so future pairings can be checked.",
            ],
            RiskLevel::Moderate => &[
                "Moderate relatedness: monitor kids for reduced vigor or birth defects.",
                "Prefer a less related buck if one is available.",
            ],
            RiskLevel::High => &[
                "High relatedness: this pairing is not recommended.",
                "Choose an unrelated buck or bring in outside genetics.",
                "If you proceed, keep detailed health records on the kids.",
            ],
            RiskLevel::Extreme => &[
                "Extreme relatedness (equivalent to parent/offspring or full siblings or closer): avoid this pairing.",
                "Select an unrelated buck from outside the herd.",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

/// How much one shared ancestor adds to the coefficient
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorContribution {
    pub ancestor_id: String,
    pub sire_distance: usize,
    pub dam_distance: usize,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InbreedingAnalysis {
    pub sire_id: String,
    pub dam_id: String,
    pub coefficient: f64,
    pub risk: RiskLevel,
    pub common_ancestors: Vec<String>,
    pub contributions: Vec<AncestorContribution>,
    /// One candidate appears in the other's recorded ancestry. Reported
    /// separately; it does not feed the coefficient.
    pub direct_line: bool,
    pub recommendations: Vec<String>,
}

const DIRECT_LINE_WARNING: &str =
    "One candidate is a direct ancestor of the other: avoid this pairing regardless of the coefficient.";

/// Estimate the coefficient of relationship between a candidate sire and dam.
///
/// Only the candidates' ancestors are intersected, so a candidate with no
/// recorded ancestry always scores 0. Direct-line pairings are flagged in
/// [`InbreedingAnalysis::direct_line`]. The result does not depend on
/// argument order.
pub fn analyze<L: GoatLookup + ?Sized>(lookup: &L, sire_id: &str, dam_id: &str) -> InbreedingAnalysis {
    let sire_line = ancestor_distances(lookup, sire_id);
    let dam_line = ancestor_distances(lookup, dam_id);

    // BTreeMap keeps the summation order independent of argument order
    let shared: BTreeMap<&str, (usize, usize)> = sire_line
        .iter()
        .filter_map(|(id, &sire_distance)| {
            let &dam_distance = dam_line.get(id)?;
            Some((id.as_str(), (sire_distance, dam_distance)))
        })
        .collect();

    let mut coefficient = 0.0;
    let mut contributions = Vec::with_capacity(shared.len());
    for (id, (sire_distance, dam_distance)) in &shared {
        let contribution = 0.5f64.powi((sire_distance + dam_distance + 1) as i32);
        coefficient += contribution;
        contributions.push(AncestorContribution {
            ancestor_id: id.to_string(),
            sire_distance: *sire_distance,
            dam_distance: *dam_distance,
            contribution,
        });
    }

    let risk = RiskLevel::from_coefficient(coefficient);
    let direct_line = sire_id != dam_id && (dam_line.contains_key(sire_id) || sire_line.contains_key(dam_id));

    let mut recommendations = risk.recommendations();
    if direct_line {
        recommendations.insert(0, DIRECT_LINE_WARNING.to_string());
    }

    InbreedingAnalysis {
        sire_id: sire_id.to_string(),
        dam_id: dam_id.to_string(),
        coefficient,
        risk,
        common_ancestors: shared.keys().map(|id| id.to_string()).collect(),
        contributions,
        direct_line,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{goat, herd};
    use super::*;

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(RiskLevel::from_coefficient(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_coefficient(0.0624), RiskLevel::Low);
        assert_eq!(RiskLevel::from_coefficient(0.0625), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_coefficient(0.125), RiskLevel::High);
        assert_eq!(RiskLevel::from_coefficient(0.25), RiskLevel::Extreme);
        assert_eq!(RiskLevel::from_coefficient(0.6), RiskLevel::Extreme);
    }

    #[test]
    fn test_full_siblings() {
        let h = herd(vec![
            goat("sib_m", 2023, Some("s1"), Some("d1")),
            goat("sib_f", 2023, Some("s1"), Some("d1")),
            goat("s1", 2019, None, None),
            goat("d1", 2019, None, None),
        ]);

        let analysis = analyze(&h, "sib_m", "sib_f");
        assert!((analysis.coefficient - 0.25).abs() < 1e-9);
        assert!(matches!(analysis.risk, RiskLevel::High | RiskLevel::Extreme));
        assert_eq!(analysis.common_ancestors, vec!["d1", "s1"]);
        assert!(!analysis.recommendations.is_empty());
    }

    #[test]
    fn test_half_siblings() {
        let h = herd(vec![
            goat("a", 2023, Some("s1"), Some("d1")),
            goat("b", 2023, Some("s1"), Some("d2")),
            goat("s1", 2019, None, None),
            goat("d1", 2019, None, None),
            goat("d2", 2019, None, None),
        ]);

        let analysis = analyze(&h, "a", "b");
        assert!((analysis.coefficient - 0.125).abs() < 1e-9);
        assert_eq!(analysis.risk, RiskLevel::High);
    }

    #[test]
    fn test_unrelated_pair() {
        let h = herd(vec![
            goat("a", 2024, Some("a1"), Some("a2")),
            goat("a1", 2021, Some("a3"), Some("a4")),
            goat("a3", 2018, Some("a5"), None),
            goat("b", 2024, Some("b1"), Some("b2")),
            goat("b1", 2021, Some("b3"), Some("b4")),
            goat("b3", 2018, Some("b5"), None),
        ]);

        let analysis = analyze(&h, "a", "b");
        assert_eq!(analysis.coefficient, 0.0);
        assert_eq!(analysis.risk, RiskLevel::Low);
        assert!(analysis.common_ancestors.is_empty());
    }

    #[test]
    fn test_no_recorded_ancestry() {
        let h = herd(vec![goat("a", 2024, None, None)]);
        let analysis = analyze(&h, "a", "unknown");
        assert_eq!(analysis.coefficient, 0.0);
        assert_eq!(analysis.risk, RiskLevel::Low);
    }

    #[test]
    fn test_order_independent() {
        let h = herd(vec![
            goat("x", 2024, Some("s1"), Some("d1")),
            goat("y", 2024, Some("s2"), Some("d2")),
            goat("s1", 2021, Some("g1"), Some("g2")),
            goat("d1", 2021, Some("g3"), Some("g2")),
            goat("s2", 2021, Some("g1"), Some("g4")),
            goat("d2", 2021, Some("g3"), None),
        ]);

        let forward = analyze(&h, "x", "y");
        let backward = analyze(&h, "y", "x");
        assert_eq!(forward.coefficient, backward.coefficient);
        assert_eq!(forward.common_ancestors, backward.common_ancestors);
        assert!(forward.coefficient > 0.0);
    }

    #[test]
    fn test_parent_offspring() {
        let h = herd(vec![
            goat("s1", 2019, None, None),
            goat("daughter", 2022, Some("s1"), Some("d1")),
            goat("d1", 2019, None, None),
        ]);

        // s1 has no recorded ancestry, so nothing is shared
        let analysis = analyze(&h, "s1", "daughter");
        assert_eq!(analysis.coefficient, 0.0);
        assert_eq!(analysis.risk, RiskLevel::Low);
        assert!(analysis.common_ancestors.is_empty());
        assert!(analysis.direct_line);
        assert_eq!(analysis.recommendations[0], DIRECT_LINE_WARNING);

        let reversed = analyze(&h, "daughter", "s1");
        assert_eq!(reversed.coefficient, 0.0);
        assert!(reversed.direct_line);
    }

    #[test]
    fn test_siblings_not_direct_line() {
        let h = herd(vec![
            goat("a", 2023, Some("s1"), Some("d1")),
            goat("b", 2023, Some("s1"), Some("d1")),
        ]);
        assert!(!analyze(&h, "a", "b").direct_line);
    }

    #[test]
    fn test_cyclic_data_terminates() {
        let h = herd(vec![
            goat("a", 2020, Some("b"), None),
            goat("b", 2020, Some("a"), None),
        ]);
        let analysis = analyze(&h, "a", "b");
        assert!(analysis.coefficient.is_finite());
    }
}
