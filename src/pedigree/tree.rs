//! Pedigree graph builder
//!
//! Expands a root goat's ancestry breadth-first into a flat list of nodes and
//! parent→child edges. A goat reached through several paths is one node with
//! several edges, so the result is a DAG drawn as a tree. Breadth-first order
//! guarantees each goat is first met at its shallowest generation.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use super::{GoatLookup, MAX_GENERATIONS};
use crate::models::{Gender, Goat, GoatStatus};

/// Horizontal distance between generations
pub const GENERATION_SPACING: f64 = 220.0;

/// Vertical extent of one generation's branches around the root
pub const BRANCH_SPREAD: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Layout coordinate for the node at `branch` within `generation`.
///
/// Branches are numbered left to right: the father of branch `i` is `2i`,
/// the mother `2i + 1`. Fathers sit above their child (negative y), mothers
/// below, and the offset halves every generation.
pub fn layout_position(generation: usize, branch: u64) -> Position {
    let slots = 2f64.powi(generation as i32);
    Position {
        x: generation as f64 * GENERATION_SPACING,
        y: (2.0 * branch as f64 + 1.0 - slots) * BRANCH_SPREAD / slots,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A goat present in the store
    Goat,
    /// Parent id set but not resolvable
    Unknown,
    /// Parent already appears below this node; descent stopped
    Cycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRole {
    Sire,
    Dam,
}

impl ParentRole {
    pub fn label(self) -> &'static str {
        match self {
            ParentRole::Sire => "sire",
            ParentRole::Dam => "dam",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedigreeNode {
    pub id: String,
    pub kind: NodeKind,
    /// Goat this node stands for (differs from `id` only for cycle markers)
    pub goat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GoatStatus>,
    pub generation: usize,
    pub branch: u64,
    pub position: Position,
    /// Node ids of this node's parents (at most two)
    pub parents: Vec<String>,
    /// Node ids of the children this node was reached from
    pub children: Vec<String>,
}

impl PedigreeNode {
    fn new(id: String, kind: NodeKind, goat_id: &str, goat: Option<&Goat>, generation: usize, branch: u64) -> Self {
        Self {
            id,
            kind,
            goat_id: goat_id.to_string(),
            name: goat.map(|g| g.name.clone()),
            tag_number: goat.map(|g| g.tag_number.clone()),
            gender: goat.map(|g| g.gender),
            date_of_birth: goat.map(|g| g.date_of_birth),
            status: goat.map(|g| g.status),
            generation,
            branch,
            position: layout_position(generation, branch),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Parent → child link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedigreeEdge {
    pub from: String,
    pub to: String,
    pub role: ParentRole,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedigreeTree {
    pub root_id: String,
    pub max_generations: usize,
    pub nodes: Vec<PedigreeNode>,
    pub edges: Vec<PedigreeEdge>,
}

impl PedigreeTree {
    fn empty(root_id: &str, max_generations: usize) -> Self {
        Self {
            root_id: root_id.to_string(),
            max_generations,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&PedigreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges whose parent end is `id`
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a PedigreeEdge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn deepest_generation(&self) -> usize {
        self.nodes.iter().map(|n| n.generation).max().unwrap_or(0)
    }
}

struct Builder {
    nodes: Vec<PedigreeNode>,
    index: HashMap<String, usize>,
    edges: Vec<PedigreeEdge>,
}

impl Builder {
    fn add_node(&mut self, node: PedigreeNode) -> usize {
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        idx
    }

    fn link(&mut self, parent_idx: usize, child_idx: usize, role: ParentRole) {
        let parent_id = self.nodes[parent_idx].id.clone();
        let child_id = self.nodes[child_idx].id.clone();
        self.nodes[parent_idx].children.push(child_id.clone());
        self.nodes[child_idx].parents.push(parent_id.clone());
        self.edges.push(PedigreeEdge {
            from: parent_id,
            to: child_id,
            role,
        });
    }

    /// Whether `target` is reachable from `from` through child links, i.e.
    /// `target` is `from` or one of its descendants already in the graph
    fn is_descendant(&self, from: usize, target: usize) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(idx) = queue.pop_front() {
            if idx == target {
                return true;
            }
            if !visited.insert(idx) {
                continue;
            }
            for child in &self.nodes[idx].children {
                if let Some(&child_idx) = self.index.get(child) {
                    queue.push_back(child_idx);
                }
            }
        }
        false
    }
}

/// Build the ancestor graph of `root_id`, `max_generations` deep.
///
/// An unknown root yields an empty tree. `max_generations` is clamped into
/// `1..=MAX_GENERATIONS`.
pub fn build_tree<L: GoatLookup + ?Sized>(lookup: &L, root_id: &str, max_generations: usize) -> PedigreeTree {
    let max_generations = max_generations.clamp(1, MAX_GENERATIONS);

    let Some(root) = lookup.find_goat(root_id) else {
        debug!(root = %root_id, "Pedigree root not found, returning empty tree");
        return PedigreeTree::empty(root_id, max_generations);
    };

    let mut builder = Builder {
        nodes: Vec::new(),
        index: HashMap::new(),
        edges: Vec::new(),
    };
    let root_idx = builder.add_node(PedigreeNode::new(
        root.id.clone(),
        NodeKind::Goat,
        &root.id,
        Some(root),
        0,
        0,
    ));

    let mut queue = VecDeque::from([root_idx]);
    while let Some(child_idx) = queue.pop_front() {
        let (generation, branch) = {
            let node = &builder.nodes[child_idx];
            (node.generation, node.branch)
        };
        if generation >= max_generations {
            continue;
        }
        let Some(goat) = lookup.find_goat(&builder.nodes[child_idx].goat_id) else {
            continue;
        };

        let parents = [
            (ParentRole::Sire, goat.father_id.as_deref(), branch * 2),
            (ParentRole::Dam, goat.mother_id.as_deref(), branch * 2 + 1),
        ];

        for (role, parent_id, parent_branch) in parents {
            let Some(parent_id) = parent_id else {
                continue;
            };
            let parent_generation = generation + 1;

            if let Some(&existing) = builder.index.get(parent_id) {
                if builder.is_descendant(child_idx, existing) {
                    debug!(
                        goat = %goat.id,
                        parent = %parent_id,
                        "Parent already below this goat, marking cycle"
                    );
                    let marker = PedigreeNode::new(
                        format!("cycle:{}:{}:{}", role.label(), parent_id, goat.id),
                        NodeKind::Cycle,
                        parent_id,
                        lookup.find_goat(parent_id),
                        parent_generation,
                        parent_branch,
                    );
                    let marker_idx = builder.add_node(marker);
                    builder.link(marker_idx, child_idx, role);
                } else {
                    builder.link(existing, child_idx, role);
                }
                continue;
            }

            let parent_idx = match lookup.find_goat(parent_id) {
                Some(parent) => {
                    let idx = builder.add_node(PedigreeNode::new(
                        parent.id.clone(),
                        NodeKind::Goat,
                        &parent.id,
                        Some(parent),
                        parent_generation,
                        parent_branch,
                    ));
                    queue.push_back(idx);
                    idx
                }
                None => builder.add_node(PedigreeNode::new(
                    parent_id.to_string(),
                    NodeKind::Unknown,
                    parent_id,
                    None,
                    parent_generation,
                    parent_branch,
                )),
            };
            builder.link(parent_idx, child_idx, role);
        }
    }

    PedigreeTree {
        root_id: root_id.to_string(),
        max_generations,
        nodes: builder.nodes,
        edges: builder.edges,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{goat, herd};
    use super::*;

    #[test]
    fn test_unknown_root_gives_empty_tree() {
        let h = herd(vec![goat("a", 2020, None, None)]);
        let tree = build_tree(&h, "missing", 3);
        assert!(tree.is_empty());
        assert!(tree.edges.is_empty());
    }

    #[test]
    fn test_depth_bound() {
        let h = herd(vec![
            goat("kid", 2024, Some("s1"), Some("d1")),
            goat("s1", 2021, Some("s2"), Some("d2")),
            goat("d1", 2021, Some("s3"), None),
            goat("s2", 2018, Some("s4"), None),
            goat("d2", 2018, None, None),
            goat("s3", 2018, None, None),
            goat("s4", 2015, None, None),
        ]);

        let tree = build_tree(&h, "kid", 2);
        assert!(tree.nodes.iter().all(|n| n.generation <= 2));
        assert!(tree.node("s4").is_none());
        assert_eq!(tree.nodes.len(), 6);
        assert_eq!(tree.deepest_generation(), 2);
    }

    #[test]
    fn test_shared_grandsire_appears_once() {
        let h = herd(vec![
            goat("kid", 2024, Some("s1"), Some("d1")),
            goat("s1", 2021, Some("sx"), None),
            goat("d1", 2021, Some("sx"), None),
            goat("sx", 2017, None, None),
        ]);

        let tree = build_tree(&h, "kid", 4);
        assert_eq!(tree.nodes.iter().filter(|n| n.id == "sx").count(), 1);

        let edges: Vec<_> = tree.edges_from("sx").collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.to == "s1"));
        assert!(edges.iter().any(|e| e.to == "d1"));

        let sx = tree.node("sx").unwrap();
        assert_eq!(sx.children.len(), 2);
        // First reached through the sire line
        assert_eq!(sx.branch, 0);
    }

    #[test]
    fn test_missing_parent_becomes_placeholder() {
        let h = herd(vec![goat("kid", 2024, Some("s1"), Some("lost"))]);

        let tree = build_tree(&h, "kid", 3);
        let lost = tree.node("lost").unwrap();
        assert_eq!(lost.kind, NodeKind::Unknown);
        assert!(lost.name.is_none());
        assert!(tree.edges.iter().any(|e| e.from == "lost" && e.role == ParentRole::Dam));
        assert_eq!(tree.node("s1").unwrap().kind, NodeKind::Unknown);
    }

    #[test]
    fn test_cycle_is_cut() {
        let h = herd(vec![
            goat("a", 2020, Some("b"), None),
            goat("b", 2019, Some("c"), None),
            goat("c", 2018, Some("a"), None),
        ]);

        let tree = build_tree(&h, "a", 10);
        let marker = tree
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Cycle)
            .expect("cycle marker");
        assert_eq!(marker.goat_id, "a");
        assert_eq!(tree.nodes.len(), 4);

        let mut ids: Vec<_> = tree.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), tree.nodes.len());
    }

    #[test]
    fn test_self_parent_is_cut() {
        let h = herd(vec![goat("a", 2020, Some("a"), None)]);
        let tree = build_tree(&h, "a", 5);
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[1].kind, NodeKind::Cycle);
    }

    #[test]
    fn test_self_parent_on_both_sides_gets_distinct_markers() {
        let h = herd(vec![goat("a", 2020, Some("a"), Some("a"))]);
        let tree = build_tree(&h, "a", 5);
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes.iter().filter(|n| n.kind == NodeKind::Cycle).count(), 2);

        let ids: std::collections::HashSet<_> = tree.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), tree.nodes.len());
        assert!(tree.edges.iter().any(|e| e.role == ParentRole::Sire));
        assert!(tree.edges.iter().any(|e| e.role == ParentRole::Dam));
    }

    #[test]
    fn test_generations_clamped() {
        let h = herd(vec![goat("kid", 2024, Some("s1"), None), goat("s1", 2021, None, None)]);
        assert_eq!(build_tree(&h, "kid", 0).max_generations, 1);
        assert_eq!(build_tree(&h, "kid", 500).max_generations, MAX_GENERATIONS);
    }

    #[test]
    fn test_layout_is_deterministic_and_sided() {
        assert_eq!(layout_position(0, 0), Position { x: 0.0, y: 0.0 });
        assert_eq!(layout_position(1, 0), Position { x: 220.0, y: -200.0 });
        assert_eq!(layout_position(1, 1), Position { x: 220.0, y: 200.0 });
        assert_eq!(layout_position(2, 0).y, -300.0);
        assert_eq!(layout_position(2, 1).y, -100.0);
        assert_eq!(layout_position(2, 3).y, 300.0);

        let h = herd(vec![
            goat("kid", 2024, Some("s1"), Some("d1")),
            goat("s1", 2021, None, None),
            goat("d1", 2021, None, None),
        ]);
        let first = build_tree(&h, "kid", 3);
        let second = build_tree(&h, "kid", 3);
        for (a, b) in first.nodes.iter().zip(&second.nodes) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.position, b.position);
        }
        assert!(first.node("s1").unwrap().position.y < 0.0);
        assert!(first.node("d1").unwrap().position.y > 0.0);
    }
}
