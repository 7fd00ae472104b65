//! In-memory view over the entity relationship graph.

use crate::knowledge_store::{Entity, EntityEdge};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const MAX_NEIGHBORHOOD_DEPTH: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Degree {
    pub incoming: usize,
    pub outgoing: usize,
}

impl Degree {
    pub fn total(&self) -> usize {
        self.incoming + self.outgoing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub code: String,
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub depth: u32,
    /// True when the code only appears in edges and has no entity row.
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub root: String,
    pub depth: u32,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EntityEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipCount {
    pub relationship: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub edge_count: usize,
    pub placeholder_count: usize,
    pub orphan_count: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub relationships: Vec<RelationshipCount>,
}

pub struct EntityGraph {
    entities: HashMap<String, Entity>,
    edges: Vec<EntityEdge>,
    // code -> indices into `edges`
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl EntityGraph {
    pub fn from_edges(entities: Vec<Entity>, edges: Vec<EntityEdge>) -> Self {
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, edge) in edges.iter().enumerate() {
            outgoing
                .entry(edge.source_code.clone())
                .or_default()
                .push(index);
            incoming
                .entry(edge.target_code.clone())
                .or_default()
                .push(index);
        }
        Self {
            entities: entities
                .into_iter()
                .map(|entity| (entity.code.clone(), entity))
                .collect(),
            edges,
            outgoing,
            incoming,
        }
    }

    pub fn entity(&self, code: &str) -> Option<&Entity> {
        self.entities.get(code)
    }

    /// Whether the code has an entity row or appears in any edge.
    pub fn contains(&self, code: &str) -> bool {
        self.entities.contains_key(code)
            || self.outgoing.contains_key(code)
            || self.incoming.contains_key(code)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn degree(&self, code: &str) -> Degree {
        Degree {
            incoming: self.incoming.get(code).map_or(0, Vec::len),
            outgoing: self.outgoing.get(code).map_or(0, Vec::len),
        }
    }

    pub fn outgoing_edges(&self, code: &str) -> Vec<&EntityEdge> {
        self.edges_at(self.outgoing.get(code))
    }

    pub fn incoming_edges(&self, code: &str) -> Vec<&EntityEdge> {
        self.edges_at(self.incoming.get(code))
    }

    fn edges_at(&self, indices: Option<&Vec<usize>>) -> Vec<&EntityEdge> {
        indices
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    /// Codes directly connected to `code` in either direction, sorted and deduplicated.
    pub fn neighbors(&self, code: &str) -> Vec<&str> {
        let mut neighbors: Vec<&str> = self
            .outgoing_edges(code)
            .into_iter()
            .map(|edge| edge.target_code.as_str())
            .chain(
                self.incoming_edges(code)
                    .into_iter()
                    .map(|edge| edge.source_code.as_str()),
            )
            .filter(|neighbor| *neighbor != code)
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Breadth-first walk from `root` following edges in both directions, up to
    /// `depth` hops (clamped to 1..=3). Returns `None` when the code is unknown.
    pub fn neighborhood(&self, root: &str, depth: u32) -> Option<Subgraph> {
        if !self.contains(root) {
            return None;
        }
        let depth = depth.clamp(1, MAX_NEIGHBORHOOD_DEPTH);

        let mut visited: HashMap<&str, u32> = HashMap::new();
        let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
        visited.insert(root, 0);
        queue.push_back((root, 0));

        while let Some((code, distance)) = queue.pop_front() {
            if distance == depth {
                continue;
            }
            for neighbor in self.neighbors(code) {
                if !visited.contains_key(neighbor) {
                    visited.insert(neighbor, distance + 1);
                    queue.push_back((neighbor, distance + 1));
                }
            }
        }

        let mut nodes: Vec<GraphNode> = visited
            .iter()
            .map(|(&code, &node_depth)| self.node(code, node_depth))
            .collect();
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.code.cmp(&b.code)));

        let edges = self
            .edges
            .iter()
            .filter(|edge| {
                visited.contains_key(edge.source_code.as_str())
                    && visited.contains_key(edge.target_code.as_str())
            })
            .cloned()
            .collect();

        Some(Subgraph {
            root: root.to_string(),
            depth,
            nodes,
            edges,
        })
    }

    fn node(&self, code: &str, depth: u32) -> GraphNode {
        match self.entities.get(code) {
            Some(entity) => GraphNode {
                code: code.to_string(),
                name: Some(entity.name.clone()),
                entity_type: Some(entity.entity_type.clone()),
                depth,
                placeholder: false,
            },
            None => GraphNode {
                code: code.to_string(),
                name: None,
                entity_type: None,
                depth,
                placeholder: true,
            },
        }
    }

    /// Edge counts per relationship, most frequent first.
    pub fn relationship_histogram(&self) -> Vec<RelationshipCount> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.relationship.as_str()).or_default() += 1;
        }
        let mut histogram: Vec<RelationshipCount> = counts
            .into_iter()
            .map(|(relationship, count)| RelationshipCount {
                relationship: relationship.to_string(),
                count,
            })
            .collect();
        histogram.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.relationship.cmp(&b.relationship)));
        histogram
    }

    /// Entities with neither incoming nor outgoing edges, sorted by code.
    pub fn orphans(&self) -> Vec<&Entity> {
        let mut orphans: Vec<&Entity> = self
            .entities
            .values()
            .filter(|entity| self.degree(&entity.code).total() == 0)
            .collect();
        orphans.sort_by(|a, b| a.code.cmp(&b.code));
        orphans
    }

    /// Codes referenced by edges that have no entity row.
    pub fn placeholder_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self
            .outgoing
            .keys()
            .chain(self.incoming.keys())
            .map(String::as_str)
            .filter(|code| !self.entities.contains_key(*code))
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }

    pub fn stats(&self) -> GraphStats {
        let mut entity_types: BTreeMap<String, usize> = BTreeMap::new();
        for entity in self.entities.values() {
            *entity_types.entry(entity.entity_type.clone()).or_default() += 1;
        }
        GraphStats {
            entity_count: self.entity_count(),
            edge_count: self.edge_count(),
            placeholder_count: self.placeholder_codes().len(),
            orphan_count: self.orphans().len(),
            entity_types,
            relationships: self.relationship_histogram(),
        }
    }
}
